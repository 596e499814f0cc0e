// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express:
//! numeric ranges for sweep tuning, threshold ordering, and cron syntax.

use std::str::FromStr;

use croner::Cron;

use crate::diagnostic::ConfigError;
use crate::model::LexbillConfig;

/// Largest candidate limit either sweep accepts.
pub const MAX_SWEEP_LIMIT: u32 = 10_000;

/// Largest classifier batch the AI sweep accepts.
pub const MAX_BATCH_SIZE: u32 = 50;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LexbillConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    check_limit("date_sweep.limit", config.date_sweep.limit, &mut fail);
    check_schedule("date_sweep.schedule", &config.date_sweep.schedule, &mut fail);

    let ai = &config.ai_sweep;
    check_limit("ai_sweep.limit", ai.limit, &mut fail);
    check_schedule("ai_sweep.schedule", &ai.schedule, &mut fail);

    if ai.batch_size == 0 || ai.batch_size > MAX_BATCH_SIZE {
        fail(format!(
            "ai_sweep.batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
            ai.batch_size
        ));
    }

    let min_ok = check_unit("ai_sweep.min_confidence", ai.min_confidence, &mut fail);
    let auto_ok = check_unit(
        "ai_sweep.auto_confirm_confidence",
        ai.auto_confirm_confidence,
        &mut fail,
    );
    if min_ok && auto_ok && ai.min_confidence > ai.auto_confirm_confidence {
        fail(format!(
            "ai_sweep.min_confidence ({}) must not exceed ai_sweep.auto_confirm_confidence ({})",
            ai.min_confidence, ai.auto_confirm_confidence
        ));
    }

    if let Some(key) = &config.anthropic.api_key {
        if key.trim().is_empty() {
            fail("anthropic.api_key must not be blank when set".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_limit(key: &str, value: u32, fail: &mut impl FnMut(String)) {
    if value == 0 || value > MAX_SWEEP_LIMIT {
        fail(format!(
            "{key} must be between 1 and {MAX_SWEEP_LIMIT}, got {value}"
        ));
    }
}

fn check_unit(key: &str, value: f64, fail: &mut impl FnMut(String)) -> bool {
    let ok = (0.0..=1.0).contains(&value);
    if !ok {
        fail(format!("{key} must be between 0.0 and 1.0, got {value}"));
    }
    ok
}

fn check_schedule(key: &str, pattern: &str, fail: &mut impl FnMut(String)) {
    if let Err(e) = Cron::from_str(pattern) {
        fail(format!("{key} `{pattern}` is not a valid cron expression: {e}"));
    }
}
