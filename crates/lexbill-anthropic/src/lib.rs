// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude milestone classifier for Lexbill.
//!
//! This crate implements [`MilestoneClassifier`] over the Anthropic Messages
//! API. It sends one batch of milestone texts per request and hands the raw
//! model text back; validating that text is the AI sweep's job.

pub mod client;
pub mod types;

use async_trait::async_trait;
use lexbill_config::model::AnthropicConfig;
use lexbill_core::error::LexbillError;
use lexbill_core::traits::{MilestoneClassifier, PluginAdapter};
use lexbill_core::types::{AdapterType, ClassificationRequest, HealthStatus};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest, SystemBlock};

/// Instructions sent as the cached system prompt of every batch.
pub const SYSTEM_PROMPT: &str = "\
You review billing milestones of a law firm. Each milestone describes, in English, \
Chinese, or both, the event or date on which a fee instalment becomes payable \
(for example \"upon submission of the listing application\" or \"2025年3月31日前\").

You receive JSON {\"asOfDate\": \"YYYY-MM-DD\", \"milestones\": [...]}. For every \
milestone decide whether its payment condition has been met on or before asOfDate. \
Only answer due=true when the text states a calendar date that has passed, or \
describes an event that by its own terms must already have happened by asOfDate. \
Treat conditions joined by \"and\" as all required and conditions joined by \"or\" \
as any one sufficient. Unknown project progress means not due.

Reply with JSON only, no prose and no code fences:
{\"results\": [{\"index\": <milestone index>, \"due\": <true|false>, \
\"confidence\": <0.0-1.0>, \"reason\": \"<short reason>\", \
\"parsedDate\": \"<YYYY-MM-DD or null>\"}]}
Return exactly one result per milestone index.";

/// Anthropic-backed implementation of [`MilestoneClassifier`].
pub struct AnthropicClassifier {
    client: AnthropicClient,
    max_tokens: u32,
}

impl AnthropicClassifier {
    /// Builds a classifier from configuration.
    ///
    /// # API Key Resolution
    /// 1. `config.api_key` if set and non-empty
    /// 2. `ANTHROPIC_API_KEY` environment variable
    ///
    /// Returns `Ok(None)` when neither is available, which leaves the AI
    /// sweep disabled rather than failing.
    pub fn from_config(config: &AnthropicConfig) -> Result<Option<Self>, LexbillError> {
        let Some(api_key) = resolve_api_key(config.api_key.as_deref()) else {
            info!("no Anthropic API key configured, AI classifier disabled");
            return Ok(None);
        };

        let client = AnthropicClient::new(
            &api_key,
            &config.api_version,
            config.default_model.clone(),
        )?;
        info!(model = %config.default_model, "Anthropic classifier initialized");
        Ok(Some(Self::with_client(client, config.max_tokens)))
    }

    /// Creates a classifier around an existing client.
    pub fn with_client(client: AnthropicClient, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }

    fn to_message_request(
        &self,
        request: &ClassificationRequest,
    ) -> Result<MessageRequest, LexbillError> {
        let payload = serde_json::to_string(request).map_err(|e| {
            LexbillError::Internal(format!("failed to encode classification request: {e}"))
        })?;
        Ok(MessageRequest {
            model: self.client.default_model().to_string(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: payload,
            }],
            system: vec![SystemBlock::cached_text(SYSTEM_PROMPT)],
            max_tokens: self.max_tokens,
            temperature: Some(0.0),
        })
    }
}

#[async_trait]
impl PluginAdapter for AnthropicClassifier {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, LexbillError> {
        // No API call: a probe would spend tokens on every startup.
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl MilestoneClassifier for AnthropicClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<String, LexbillError> {
        let api_request = self.to_message_request(request)?;
        let response = self.client.complete_message(&api_request).await?;
        debug!(
            milestones = request.milestones.len(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            cache_read_tokens = response.usage.cache_read_input_tokens,
            stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
            "classification batch completed"
        );
        Ok(response.text())
    }
}

/// Resolves the API key from config, then `ANTHROPIC_API_KEY`.
fn resolve_api_key(config_key: Option<&str>) -> Option<String> {
    match config_key.map(str::trim) {
        Some(key) if !key.is_empty() => Some(key.to_string()),
        _ => std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexbill_core::types::MilestonePrompt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ClassificationRequest {
        ClassificationRequest {
            as_of_date: "2025-03-01".into(),
            milestones: vec![MilestonePrompt {
                index: 0,
                milestone_id: 41,
                project_name: "Project Atlas".into(),
                cm_no: Some("CM-100".into()),
                title: Some("(b) upon filing of A1 application".into()),
                trigger_text: Some("递交上市申请时".into()),
                raw_fragment: None,
            }],
        }
    }

    fn classifier(server: &MockServer) -> AnthropicClassifier {
        let client = AnthropicClient::new("test-key", "2023-06-01", "claude-haiku-4-5".into())
            .unwrap()
            .with_base_url(server.uri());
        AnthropicClassifier::with_client(client, 1024)
    }

    #[test]
    fn config_key_wins_and_blank_is_ignored() {
        assert_eq!(resolve_api_key(Some(" sk-1 ")).as_deref(), Some("sk-1"));
        // Blank config falls through to the environment, which may or may not be set.
        let from_env = resolve_api_key(Some("   "));
        assert!(from_env.as_deref() != Some(""));
    }

    #[test]
    fn message_request_embeds_batch_as_json() {
        let client = AnthropicClient::new("k", "2023-06-01", "claude-haiku-4-5".into()).unwrap();
        let classifier = AnthropicClassifier::with_client(client, 900);
        let req = classifier.to_message_request(&request()).unwrap();

        assert_eq!(req.max_tokens, 900);
        assert_eq!(req.system.len(), 1);
        assert!(req.system[0].text.contains("\"results\""));
        let payload: serde_json::Value = serde_json::from_str(&req.messages[0].content).unwrap();
        assert_eq!(payload["asOfDate"], "2025-03-01");
        assert_eq!(payload["milestones"][0]["milestoneId"], 41);
    }

    #[tokio::test]
    async fn classify_returns_raw_model_text() {
        let server = MockServer::start().await;
        let model_text = r#"{"results":[{"index":0,"due":true,"confidence":0.81}]}"#;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-haiku-4-5",
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_c",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": model_text}],
                "model": "claude-haiku-4-5",
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 300, "output_tokens": 20}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = classifier(&server).classify(&request()).await.unwrap();
        assert_eq!(text, model_text);
    }

    #[tokio::test]
    async fn classify_surfaces_provider_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"type": "overloaded_error", "message": "busy"}
            })))
            .mount(&server)
            .await;

        let err = classifier(&server).classify(&request()).await.unwrap_err();
        assert!(matches!(err, LexbillError::Provider { .. }));
    }

    #[tokio::test]
    async fn adapter_metadata() {
        let server = MockServer::start().await;
        let c = classifier(&server);
        assert_eq!(c.name(), "anthropic");
        assert_eq!(c.adapter_type(), AdapterType::Classifier);
        assert_eq!(c.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
