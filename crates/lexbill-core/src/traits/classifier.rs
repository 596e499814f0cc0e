// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifier adapter trait for AI-assisted due-date inference.

use async_trait::async_trait;

use crate::error::LexbillError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ClassificationRequest;

/// Adapter for a language-model classifier that decides whether milestones are due.
///
/// Implementations send one batch per call and return the model's raw text.
/// Validating that text against the result schema is the caller's job, so a
/// malformed answer is never an `Err` here; only transport and provider
/// failures are.
#[async_trait]
pub trait MilestoneClassifier: PluginAdapter {
    /// Classifies a batch of milestones and returns the raw model output.
    async fn classify(&self, request: &ClassificationRequest) -> Result<String, LexbillError>;
}
