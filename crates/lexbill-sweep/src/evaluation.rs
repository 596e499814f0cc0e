// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifier request building and response validation for the AI sweep.
//!
//! The model's reply is untrusted text. It is parsed leniently (surrounding
//! prose and code fences are tolerated), validated against a JSON Schema, and
//! degraded to "no evaluations" when anything is off. Nothing in this module
//! returns an error.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use jsonschema::Validator;
use lexbill_core::{ClassificationRequest, MilestonePrompt};
use lexbill_storage::AiSweepCandidate;
use serde_json::{Value, json};
use tracing::{error, warn};

/// Character budget for milestone titles sent to the classifier.
pub const TITLE_BUDGET: usize = 240;
/// Character budget for trigger text and raw fragments.
pub const TEXT_BUDGET: usize = 800;

/// One validated classifier verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Position of the milestone within its batch.
    pub index: usize,
    pub due: bool,
    /// As reported; thresholds compare this value unrounded.
    pub confidence: f64,
    pub reason: Option<String>,
    pub parsed_date: Option<String>,
}

fn response_schema() -> Value {
    json!({
        "type": "object",
        "required": ["results"],
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["index", "due", "confidence"],
                    "properties": {
                        "index": { "type": "integer", "minimum": 0 },
                        "due": { "type": "boolean" },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                        "reason": { "type": "string" },
                        "parsedDate": { "type": ["string", "null"] }
                    }
                }
            }
        }
    })
}

static VALIDATOR: LazyLock<Option<Validator>> = LazyLock::new(|| {
    jsonschema::validator_for(&response_schema())
        .map_err(|e| error!(error = %e, "classifier response schema failed to compile"))
        .ok()
});

/// Truncate to at most `budget` characters, dropping blank values.
pub fn truncate_field(value: Option<&str>, budget: usize) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.chars().take(budget).collect())
}

/// Build the classifier request for one batch.
///
/// Prompt indices are batch positions, so they always start at zero.
pub fn build_request(as_of: NaiveDate, batch: &[AiSweepCandidate]) -> ClassificationRequest {
    let milestones = batch
        .iter()
        .enumerate()
        .map(|(index, c)| MilestonePrompt {
            index,
            milestone_id: c.milestone_id,
            project_name: c.project_name.clone(),
            cm_no: c.cm_no.clone(),
            title: truncate_field(c.title.as_deref(), TITLE_BUDGET),
            trigger_text: truncate_field(c.trigger_text.as_deref(), TEXT_BUDGET),
            raw_fragment: truncate_field(c.raw_fragment.as_deref(), TEXT_BUDGET),
        })
        .collect();

    ClassificationRequest {
        as_of_date: as_of.format("%Y-%m-%d").to_string(),
        milestones,
    }
}

/// The outermost `{ ... }` span of `text`.
fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Validate raw classifier text against a batch of `batch_len` milestones.
///
/// Returns an empty list when the text is not JSON or fails the schema.
/// Results pointing outside the batch are dropped, and for a repeated index
/// the first result wins.
pub fn parse_evaluations(text: &str, batch_len: usize) -> Vec<Evaluation> {
    let Some(span) = json_object_span(text) else {
        warn!(len = text.len(), "classifier reply contains no JSON object");
        return Vec::new();
    };

    let value: Value = match serde_json::from_str(span) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "classifier reply is not valid JSON");
            return Vec::new();
        }
    };

    let Some(validator) = VALIDATOR.as_ref() else {
        return Vec::new();
    };
    if !validator.is_valid(&value) {
        let errors: Vec<String> = validator
            .iter_errors(&value)
            .map(|e| format!("{}: {e}", e.instance_path))
            .collect();
        warn!(errors = ?errors, "classifier reply failed schema validation");
        return Vec::new();
    }

    let mut seen = HashSet::new();
    value["results"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(to_evaluation)
        .filter(|e| e.index < batch_len)
        .filter(|e| seen.insert(e.index))
        .collect()
}

fn to_evaluation(item: &Value) -> Option<Evaluation> {
    let index = match item["index"].as_u64() {
        Some(i) => i,
        // JSON Schema accepts 3.0 as an integer.
        None => {
            let f = item["index"].as_f64()?;
            if f.fract() != 0.0 || f < 0.0 {
                return None;
            }
            f as u64
        }
    };

    Some(Evaluation {
        index: usize::try_from(index).ok()?,
        due: item["due"].as_bool()?,
        confidence: item["confidence"].as_f64()?,
        reason: item["reason"].as_str().map(str::to_string),
        parsed_date: item["parsedDate"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    })
}

/// Round to two decimals.
pub fn round_confidence(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
