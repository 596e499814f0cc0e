// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lexbill sweep` command implementation.
//!
//! Runs one sweep against the configured database and prints its result
//! counters as JSON on stdout.

use lexbill_config::LexbillConfig;
use lexbill_core::LexbillError;
use lexbill_sweep::{AiSweep, AiSweepOptions, DateSweep, DateSweepOptions};
use serde_json::Value;

use crate::app::App;
use crate::{AiSweepArgs, DateSweepArgs, SweepCommand};

/// Date sweep options: command-line flags first, then `[date_sweep]`.
pub fn date_options(config: &LexbillConfig, args: &DateSweepArgs) -> DateSweepOptions {
    DateSweepOptions {
        dry_run: args.dry_run,
        limit: Some(args.limit.unwrap_or(config.date_sweep.limit)),
        as_of: args.as_of,
    }
}

/// AI sweep options: command-line flags first, then `[ai_sweep]`.
pub fn ai_options(config: &LexbillConfig, args: &AiSweepArgs) -> AiSweepOptions {
    let ai = &config.ai_sweep;
    AiSweepOptions {
        dry_run: args.dry_run,
        limit: Some(args.limit.unwrap_or(ai.limit)),
        batch_size: Some(args.batch_size.unwrap_or(ai.batch_size)),
        min_confidence: Some(args.min_confidence.unwrap_or(ai.min_confidence)),
        auto_confirm_confidence: Some(
            args.auto_confirm_confidence
                .unwrap_or(ai.auto_confirm_confidence),
        ),
        as_of: args.as_of,
    }
}

pub async fn run_sweep(config: &LexbillConfig, command: SweepCommand) -> Result<(), LexbillError> {
    let app = App::open(config).await?;

    let outcome = match &command {
        SweepCommand::Date(args) => DateSweep::new(app.db.clone())
            .run(&date_options(config, args))
            .await
            .and_then(to_json),
        SweepCommand::Ai(args) => AiSweep::new(app.db.clone(), app.classifier.clone())
            .run(&ai_options(config, args))
            .await
            .and_then(to_json),
    };

    app.close().await?;
    print_json(&outcome?)
}

pub(crate) fn to_json<T: serde::Serialize>(value: T) -> Result<Value, LexbillError> {
    serde_json::to_value(value).map_err(|e| LexbillError::Internal(e.to_string()))
}

pub(crate) fn print_json(value: &Value) -> Result<(), LexbillError> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| LexbillError::Internal(e.to_string()))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn flags_override_configured_tuning() {
        let mut config = LexbillConfig::default();
        config.ai_sweep.batch_size = 25;
        config.ai_sweep.min_confidence = 0.8;

        let args = AiSweepArgs {
            batch_size: Some(5),
            as_of: NaiveDate::from_ymd_opt(2025, 3, 1),
            ..AiSweepArgs::default()
        };
        let options = ai_options(&config, &args);
        assert_eq!(options.batch_size, Some(5));
        assert_eq!(options.min_confidence, Some(0.8));
        assert_eq!(options.limit, Some(config.ai_sweep.limit));
        assert_eq!(options.as_of, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert!(!options.dry_run);
    }

    #[test]
    fn date_options_fall_back_to_config_limit() {
        let mut config = LexbillConfig::default();
        config.date_sweep.limit = 17;
        let options = date_options(
            &config,
            &DateSweepArgs {
                dry_run: true,
                ..DateSweepArgs::default()
            },
        );
        assert_eq!(options.limit, Some(17));
        assert!(options.dry_run);
        assert_eq!(options.as_of, None);
    }
}
