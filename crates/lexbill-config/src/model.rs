// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Lexbill billing tracker.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Lexbill configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LexbillConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Anthropic API settings for the AI-assisted sweep.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Date-based milestone sweep settings.
    #[serde(default)]
    pub date_sweep: DateSweepConfig,

    /// AI-assisted milestone sweep settings.
    #[serde(default)]
    pub ai_sweep: AiSweepConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "lexbill".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` leaves the AI sweep disabled.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used to classify milestone text.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens to generate per classification batch.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-haiku-4-5-20250901".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("lexbill").join("lexbill.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("lexbill.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Date-based sweep configuration.
///
/// Read by the scheduling shell at every firing, so edits take effect
/// without a restart.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DateSweepConfig {
    /// Run the sweep on its schedule.
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,

    /// Five-field cron expression, evaluated in UTC.
    #[serde(default = "default_date_schedule")]
    pub schedule: String,

    /// Maximum candidates per run (1-10000).
    #[serde(default = "default_date_limit")]
    pub limit: u32,
}

impl Default for DateSweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            schedule: default_date_schedule(),
            limit: default_date_limit(),
        }
    }
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_date_schedule() -> String {
    "0 22 * * *".to_string()
}

fn default_date_limit() -> u32 {
    2000
}

/// AI-assisted sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AiSweepConfig {
    /// Run the sweep on its schedule. Has no effect without an API key.
    #[serde(default = "default_ai_enabled")]
    pub enabled: bool,

    /// Five-field cron expression, evaluated in UTC.
    #[serde(default = "default_ai_schedule")]
    pub schedule: String,

    /// Maximum candidates per run (1-10000).
    #[serde(default = "default_ai_limit")]
    pub limit: u32,

    /// Milestones per classifier call (1-50).
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Due results below this confidence are discarded (0.0-1.0).
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Due results at or above this confidence are applied without review (0.0-1.0).
    #[serde(default = "default_auto_confirm_confidence")]
    pub auto_confirm_confidence: f64,
}

impl Default for AiSweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_ai_enabled(),
            schedule: default_ai_schedule(),
            limit: default_ai_limit(),
            batch_size: default_batch_size(),
            min_confidence: default_min_confidence(),
            auto_confirm_confidence: default_auto_confirm_confidence(),
        }
    }
}

fn default_ai_enabled() -> bool {
    false
}

fn default_ai_schedule() -> String {
    "30 22 * * *".to_string()
}

fn default_ai_limit() -> u32 {
    200
}

fn default_batch_size() -> u32 {
    20
}

fn default_min_confidence() -> f64 {
    0.75
}

fn default_auto_confirm_confidence() -> f64 {
    0.92
}
