// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./lexbill.toml` > `~/.config/lexbill/lexbill.toml` >
//! `/etc/lexbill/lexbill.toml`, with environment variable overrides via the
//! `LEXBILL_` prefix.

// figment::Error is external and cannot be boxed without a wrapper.
#![allow(clippy::result_large_err)]

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LexbillConfig;

/// Config sections, matched as env var prefixes. Longest names first so that
/// `date_sweep_limit` never matches a shorter section.
const SECTIONS: &[&str] = &["date_sweep", "ai_sweep", "anthropic", "storage", "service"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lexbill/lexbill.toml` (system-wide)
/// 3. `~/.config/lexbill/lexbill.toml` (user XDG config)
/// 4. `./lexbill.toml` (local directory)
/// 5. `LEXBILL_*` environment variables
pub fn load_config() -> Result<LexbillConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<LexbillConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LexbillConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LexbillConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LexbillConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LexbillConfig::default()))
        .merge(Toml::file("/etc/lexbill/lexbill.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("lexbill/lexbill.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("lexbill.toml"))
        .merge(env_provider())
}

/// Map an env var key (lowercased, prefix stripped) to its dotted config path.
///
/// `date_sweep_limit` -> `date_sweep.limit`, `anthropic_api_key` -> `anthropic.api_key`.
/// Keys that match no section are passed through unchanged so that
/// `deny_unknown_fields` reports them.
pub fn env_key_to_path(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` because section and key names
/// contain underscores: `LEXBILL_AI_SWEEP_MIN_CONFIDENCE` must map to
/// `ai_sweep.min_confidence`.
fn env_provider() -> Env {
    Env::prefixed("LEXBILL_").map(|key| env_key_to_path(key.as_str()).into())
}
