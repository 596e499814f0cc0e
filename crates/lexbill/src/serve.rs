// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lexbill serve` command implementation.
//!
//! Opens storage once, then runs one scheduler task per sweep. Each task
//! sleeps until the next cron occurrence of its schedule, re-reads the
//! configuration, and runs the sweep if it is still enabled. An overlapping
//! run is skipped, never queued. SIGINT/SIGTERM stop the schedulers and the
//! database is checkpointed before exit.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use lexbill_config::LexbillConfig;
use lexbill_core::LexbillError;
use lexbill_sweep::{AiSweep, DateSweep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::sweep::{ai_options, date_options};
use crate::{AiSweepArgs, DateSweepArgs};

/// Which sweep a scheduler task drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Date,
    Ai,
}

impl Job {
    fn name(self) -> &'static str {
        match self {
            Job::Date => "date_sweep",
            Job::Ai => "ai_sweep",
        }
    }

    fn enabled(self, config: &LexbillConfig) -> bool {
        match self {
            Job::Date => config.date_sweep.enabled,
            Job::Ai => config.ai_sweep.enabled,
        }
    }

    fn schedule(self, config: &LexbillConfig) -> &str {
        match self {
            Job::Date => &config.date_sweep.schedule,
            Job::Ai => &config.ai_sweep.schedule,
        }
    }
}

/// Sweep services shared by the scheduler tasks.
struct Sweeps {
    date: DateSweep,
    ai: AiSweep,
}

impl Sweeps {
    async fn run(&self, job: Job, config: &LexbillConfig) -> Result<(), LexbillError> {
        match job {
            Job::Date => {
                let result = self
                    .date
                    .run(&date_options(config, &DateSweepArgs::default()))
                    .await?;
                debug!(?result, "scheduled date sweep finished");
            }
            Job::Ai => {
                let result = self
                    .ai
                    .run(&ai_options(config, &AiSweepArgs::default()))
                    .await?;
                debug!(?result, "scheduled AI sweep finished");
            }
        }
        Ok(())
    }
}

/// Runs the `lexbill serve` command until a shutdown signal arrives.
///
/// `config_path` is the `--config` override, re-read before every firing so
/// schedule and tuning edits apply without a restart. Storage settings are
/// read once at startup.
pub async fn run_serve(
    config: LexbillConfig,
    config_path: Option<PathBuf>,
) -> Result<(), LexbillError> {
    let app = App::open(&config).await?;
    app.log_health().await;

    let sweeps = Arc::new(Sweeps {
        date: DateSweep::new(app.db.clone()),
        ai: AiSweep::new(app.db.clone(), app.classifier.clone()),
    });
    let cancel = install_signal_handler();

    let mut handles = Vec::new();
    for job in [Job::Date, Job::Ai] {
        if !job.enabled(&config) {
            info!(job = job.name(), "sweep disabled, scheduler idle until enabled");
        }
        handles.push(tokio::spawn(schedule_loop(
            job,
            config.clone(),
            config_path.clone(),
            Arc::clone(&sweeps),
            cancel.clone(),
        )));
    }

    info!(
        date_schedule = %config.date_sweep.schedule,
        ai_schedule = %config.ai_sweep.schedule,
        ai_enabled = app.classifier.is_some(),
        "lexbill scheduler started"
    );

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "scheduler task panicked");
        }
    }

    // The scheduler tasks are joined, so this is the last handle to the sweeps.
    drop(sweeps);
    app.close().await?;
    info!("lexbill stopped");
    Ok(())
}

async fn schedule_loop(
    job: Job,
    mut config: LexbillConfig,
    config_path: Option<PathBuf>,
    sweeps: Arc<Sweeps>,
    cancel: CancellationToken,
) {
    loop {
        let schedule = job.schedule(&config).to_string();
        let next = match next_fire(&schedule, Utc::now()) {
            Ok(next) => next,
            Err(e) => {
                error!(job = job.name(), %schedule, error = %e, "scheduler stopped");
                return;
            }
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        debug!(job = job.name(), next = %next, "next sweep scheduled");

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(job = job.name(), "scheduler shutting down");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        match crate::load_config(config_path.as_deref()) {
            Ok(fresh) => config = fresh,
            Err(errors) => warn!(
                job = job.name(),
                errors = errors.len(),
                "configuration reload failed, keeping previous settings"
            ),
        }
        if !job.enabled(&config) {
            debug!(job = job.name(), "sweep disabled, skipping");
            continue;
        }

        match sweeps.run(job, &config).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                warn!(job = job.name(), "previous run still in progress, skipped");
            }
            Err(e) => error!(job = job.name(), error = %e, "scheduled sweep failed"),
        }
    }
}

/// Next occurrence of `schedule` strictly after `after`.
fn next_fire(schedule: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, LexbillError> {
    let cron = Cron::from_str(schedule)
        .map_err(|e| LexbillError::Config(format!("invalid schedule `{schedule}`: {e}")))?;
    cron.find_next_occurrence(&after, false)
        .map_err(|e| LexbillError::Config(format!("no next run for `{schedule}`: {e}")))
}

/// Returns a token cancelled on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        trigger.cancel();
    });

    token
}
