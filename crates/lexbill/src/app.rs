// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter wiring shared by every subcommand.

use std::sync::Arc;

use lexbill_config::LexbillConfig;
use lexbill_core::{
    HealthStatus, LexbillError, MilestoneClassifier, PluginAdapter, StorageAdapter,
};
use lexbill_storage::{Database, SqliteStorage};
use tracing::{info, warn};

#[cfg(feature = "anthropic")]
use lexbill_anthropic::AnthropicClassifier;

/// Initialized storage plus the optional classifier.
pub struct App {
    storage: SqliteStorage,
    pub db: Database,
    pub classifier: Option<Arc<dyn MilestoneClassifier>>,
}

impl App {
    /// Open the database (running migrations) and build the classifier.
    pub async fn open(config: &LexbillConfig) -> Result<Self, LexbillError> {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let db = storage.database()?.clone();
        let classifier = build_classifier(config)?;
        Ok(Self {
            storage,
            db,
            classifier,
        })
    }

    /// Log the health of every adapter. Never fails.
    pub async fn log_health(&self) {
        log_adapter_health(&self.storage).await;
        match &self.classifier {
            Some(classifier) => log_adapter_health(classifier.as_ref()).await,
            None => info!("no classifier configured, AI sweep disabled"),
        }
    }

    /// Checkpoint the WAL before exit.
    pub async fn close(self) -> Result<(), LexbillError> {
        self.storage.close().await
    }
}

async fn log_adapter_health<A: PluginAdapter + ?Sized>(adapter: &A) {
    let name = adapter.name();
    let kind = adapter.adapter_type();
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => {
            info!(adapter = name, %kind, version = %adapter.version(), "adapter healthy")
        }
        Ok(HealthStatus::Degraded(reason)) => {
            warn!(adapter = name, %kind, %reason, "adapter degraded")
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(adapter = name, %kind, %reason, "adapter unhealthy")
        }
        Err(e) => warn!(adapter = name, %kind, error = %e, "adapter health check failed"),
    }
}

#[cfg(feature = "anthropic")]
fn build_classifier(
    config: &LexbillConfig,
) -> Result<Option<Arc<dyn MilestoneClassifier>>, LexbillError> {
    Ok(AnthropicClassifier::from_config(&config.anthropic)?
        .map(|classifier| Arc::new(classifier) as Arc<dyn MilestoneClassifier>))
}

#[cfg(not(feature = "anthropic"))]
fn build_classifier(
    _config: &LexbillConfig,
) -> Result<Option<Arc<dyn MilestoneClassifier>>, LexbillError> {
    Ok(None)
}
