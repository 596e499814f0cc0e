// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Lexbill configuration system.

use lexbill_config::diagnostic::{ConfigError, suggest_key};
use lexbill_config::model::LexbillConfig;
use lexbill_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_lexbill_config() {
    let toml = r#"
[service]
name = "billing-nightly"
log_level = "debug"

[storage]
database_path = "/tmp/lexbill-test.db"
wal_mode = false

[anthropic]
api_key = "sk-ant-123"
default_model = "claude-sonnet-4-5"
max_tokens = 1024

[date_sweep]
enabled = false
schedule = "15 3 * * *"
limit = 500

[ai_sweep]
enabled = true
limit = 50
batch_size = 10
min_confidence = 0.8
auto_confirm_confidence = 0.95
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "billing-nightly");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/lexbill-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-ant-123"));
    assert_eq!(config.anthropic.max_tokens, 1024);
    assert!(!config.date_sweep.enabled);
    assert_eq!(config.date_sweep.schedule, "15 3 * * *");
    assert_eq!(config.date_sweep.limit, 500);
    assert!(config.ai_sweep.enabled);
    assert_eq!(config.ai_sweep.batch_size, 10);
    assert_eq!(config.ai_sweep.min_confidence, 0.8);
    assert_eq!(config.ai_sweep.auto_confirm_confidence, 0.95);
    // Unset keys keep their defaults.
    assert_eq!(config.ai_sweep.schedule, "30 22 * * *");
}

#[test]
fn unknown_field_in_ai_sweep_produces_error() {
    let toml = r#"
[ai_sweep]
min_confidense = 0.8
"#;

    let err = load_config_from_str(toml).expect_err("unknown key should be rejected");
    let message = err.to_string();
    assert!(
        message.contains("min_confidense"),
        "error should name the unknown key, got: {message}"
    );
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "x"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.service.name, "lexbill");
    assert!(config.date_sweep.enabled);
    assert!(!config.ai_sweep.enabled);
}

/// `LEXBILL_AI_SWEEP_MIN_CONFIDENCE` lands on `ai_sweep.min_confidence`,
/// simulated here with a dotted-key provider merged last.
#[test]
fn env_style_override_wins_over_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let toml_content = r#"
[ai_sweep]
min_confidence = 0.8
"#;

    let config: LexbillConfig = Figment::new()
        .merge(Serialized::defaults(LexbillConfig::default()))
        .merge(Toml::string(toml_content))
        .merge((
            lexbill_config::loader::env_key_to_path("ai_sweep_min_confidence"),
            0.85,
        ))
        .extract()
        .expect("should merge env override");

    assert_eq!(config.ai_sweep.min_confidence, 0.85);
}

#[test]
fn serialized_defaults_are_sensible() {
    let config = LexbillConfig::default();

    assert_eq!(config.service.log_level, "info");
    assert!(config.storage.database_path.ends_with("lexbill.db"));
    assert!(config.storage.wal_mode);
    assert!(config.anthropic.api_key.is_none());
    assert_eq!(config.date_sweep.schedule, "0 22 * * *");
    assert_eq!(config.date_sweep.limit, 2000);
    assert_eq!(config.ai_sweep.limit, 200);
    assert_eq!(config.ai_sweep.batch_size, 20);
    assert_eq!(config.ai_sweep.min_confidence, 0.75);
    assert_eq!(config.ai_sweep.auto_confirm_confidence, 0.92);
}

#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: LexbillConfig = Figment::new()
        .merge(Serialized::defaults(LexbillConfig::default()))
        .merge(Toml::file("/nonexistent/path/lexbill.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.service.name, "lexbill");
}

#[test]
fn diagnostic_suggests_batch_size() {
    assert_eq!(
        suggest_key("bacth_size", &["enabled", "limit", "batch_size"]),
        Some("batch_size".to_string())
    );
}

#[test]
fn unknown_key_diagnostic_carries_suggestion_and_valid_keys() {
    let toml = r#"
[date_sweep]
limt = 10
"#;

    let errors = load_and_validate_str(toml).expect_err("typo should fail");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key,
                suggestion,
                valid_keys,
                ..
            } => Some((key.clone(), suggestion.clone(), valid_keys.clone())),
            _ => None,
        })
        .expect("should produce an UnknownKey error");

    assert_eq!(unknown.0, "limt");
    assert_eq!(unknown.1.as_deref(), Some("limit"));
    assert!(unknown.2.contains("schedule"));
}

#[test]
fn invalid_type_is_reported() {
    let toml = r#"
[ai_sweep]
batch_size = "twenty"
"#;

    let errors = load_and_validate_str(toml).expect_err("string for u32 should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. })
                || e.to_string().contains("batch_size")),
        "expected a type error, got: {errors:?}"
    );
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "shedule".to_string(),
        suggestion: Some("schedule".to_string()),
        valid_keys: "enabled, schedule, limit".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `schedule`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("shedule"));
}

#[test]
fn load_and_validate_valid_toml() {
    let toml = r#"
[date_sweep]
limit = 25
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.date_sweep.limit, 25);
}

#[test]
fn validation_catches_inverted_thresholds() {
    let toml = r#"
[ai_sweep]
min_confidence = 0.95
auto_confirm_confidence = 0.9
"#;

    let errors = load_and_validate_str(toml).expect_err("inverted thresholds should fail");
    assert!(errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("must not exceed"))
    }));
}

#[test]
fn validation_catches_bad_cron_schedule() {
    let toml = r#"
[date_sweep]
schedule = "nightly"
"#;

    let errors = load_and_validate_str(toml).expect_err("bad cron should fail");
    assert!(errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("date_sweep.schedule"))
    }));
}

#[test]
fn load_and_validate_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lexbill.toml");
    std::fs::write(&path, "[ai_sweep]\nbatch_size = 5\n").expect("write config");

    let config = load_and_validate_path(&path).expect("file config should validate");
    assert_eq!(config.ai_sweep.batch_size, 5);
}
