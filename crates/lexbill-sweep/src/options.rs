// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invocation options and result counters for the sweeps.
//!
//! Options arrive from the scheduler or an operator and are normalized here:
//! out-of-range values are clamped, never rejected.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default candidate limit of the date sweep.
pub const DEFAULT_DATE_LIMIT: u32 = 2000;
/// Default candidate limit of the AI sweep.
pub const DEFAULT_AI_LIMIT: u32 = 200;
/// Upper clamp for both candidate limits.
pub const MAX_LIMIT: u32 = 10_000;
/// Default classifier batch size.
pub const DEFAULT_BATCH_SIZE: u32 = 20;
/// Upper clamp for the classifier batch size.
pub const MAX_BATCH_SIZE: u32 = 50;
/// Due results below this confidence are discarded.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.75;
/// Due results at or above this confidence are confirmed without review.
pub const DEFAULT_AUTO_CONFIRM_CONFIDENCE: f64 = 0.92;

fn clamp_count(value: Option<u32>, default: u32, max: u32) -> u32 {
    value.unwrap_or(default).clamp(1, max)
}

fn clamp_unit(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => default,
    }
}

/// Options of the date-based sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DateSweepOptions {
    pub dry_run: bool,
    pub limit: Option<u32>,
    /// Date treated as today. Defaults to the current UTC date.
    pub as_of: Option<NaiveDate>,
}

impl DateSweepOptions {
    /// The limit clamped to `[1, MAX_LIMIT]`.
    pub fn effective_limit(&self) -> u32 {
        clamp_count(self.limit, DEFAULT_DATE_LIMIT, MAX_LIMIT)
    }
}

/// Options of the AI-assisted sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSweepOptions {
    pub dry_run: bool,
    pub limit: Option<u32>,
    pub batch_size: Option<u32>,
    pub min_confidence: Option<f64>,
    pub auto_confirm_confidence: Option<f64>,
    /// Date the classifier treats as today. Defaults to the current UTC date.
    pub as_of: Option<NaiveDate>,
}

impl AiSweepOptions {
    pub fn effective_limit(&self) -> u32 {
        clamp_count(self.limit, DEFAULT_AI_LIMIT, MAX_LIMIT)
    }

    pub fn effective_batch_size(&self) -> usize {
        clamp_count(self.batch_size, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE) as usize
    }

    pub fn effective_min_confidence(&self) -> f64 {
        clamp_unit(self.min_confidence, DEFAULT_MIN_CONFIDENCE)
    }

    pub fn effective_auto_confirm_confidence(&self) -> f64 {
        clamp_unit(
            self.auto_confirm_confidence,
            DEFAULT_AUTO_CONFIRM_CONFIDENCE,
        )
    }
}

/// Counters reported by one date sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateSweepResult {
    pub dry_run: bool,
    pub scanned: u32,
    pub processed: u32,
    pub auto_linked: u32,
    pub skipped_no_staffing_project: u32,
    pub skipped_already_triggered: u32,
    pub errors: u32,
}

/// Counters reported by one AI sweep run.
///
/// `processed` is `confirmed + pending_review`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSweepResult {
    pub dry_run: bool,
    pub ai_enabled: bool,
    pub scanned: u32,
    pub ai_flagged_due: u32,
    pub processed: u32,
    pub confirmed: u32,
    pub pending_review: u32,
    pub auto_linked: u32,
    pub skipped_low_confidence: u32,
    pub skipped_no_staffing_project: u32,
    pub skipped_already_triggered: u32,
    pub errors: u32,
}
