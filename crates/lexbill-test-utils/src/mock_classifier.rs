// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fake milestone classifiers for deterministic testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Mutex, Notify};

use lexbill_core::LexbillError;
use lexbill_core::traits::{MilestoneClassifier, PluginAdapter};
use lexbill_core::types::{AdapterType, ClassificationRequest, HealthStatus};

/// Reply returned once a script runs dry.
const EMPTY_REPLY: &str = r#"{"results": []}"#;

/// Render `(index, due, confidence)` triples as a classifier reply.
pub fn verdicts(items: &[(usize, bool, f64)]) -> String {
    let results: Vec<_> = items
        .iter()
        .map(|(index, due, confidence)| {
            json!({
                "index": index,
                "due": due,
                "confidence": confidence,
                "reason": "scripted",
                "parsedDate": null,
            })
        })
        .collect();
    json!({ "results": results }).to_string()
}

/// A provider-style failure, as the HTTP client reports a 529.
pub fn overloaded() -> LexbillError {
    LexbillError::Provider {
        message: "Anthropic API error: overloaded (HTTP 529) (transient)".into(),
        source: None,
    }
}

/// A classifier that replays queued outcomes in order.
///
/// When the queue is empty it answers with an empty result list. Every
/// request is recorded for later inspection.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<String, LexbillError>>>,
    requests: Mutex<Vec<ClassificationRequest>>,
    calls: AtomicU32,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    /// Queue replies and failures to hand out, one per call.
    pub fn with_script(script: Vec<Result<String, LexbillError>>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(script)),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Shorthand for a script of successful replies.
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self::with_script(replies.into_iter().map(Ok).collect())
    }

    pub async fn push(&self, outcome: Result<String, LexbillError>) {
        self.script.lock().await.push_back(outcome);
    }

    /// Number of `classify` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in call order.
    pub async fn requests(&self) -> Vec<ClassificationRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, LexbillError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl MilestoneClassifier for ScriptedClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<String, LexbillError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(EMPTY_REPLY.to_string()))
    }
}

/// A classifier that parks every call until [`GatedClassifier::release`].
///
/// Used to hold a sweep inside its lock while a second run is attempted.
pub struct GatedClassifier {
    entered: Notify,
    gate: Notify,
    reply: String,
}

impl GatedClassifier {
    pub fn new(reply: String) -> Self {
        Self {
            entered: Notify::new(),
            gate: Notify::new(),
            reply,
        }
    }

    /// Wait until a call has reached the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked (or the next) call through.
    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl PluginAdapter for GatedClassifier {
    fn name(&self) -> &str {
        "gated-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, LexbillError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl MilestoneClassifier for GatedClassifier {
    async fn classify(&self, _request: &ClassificationRequest) -> Result<String, LexbillError> {
        self.entered.notify_one();
        self.gate.notified().await;
        Ok(self.reply.clone())
    }
}
