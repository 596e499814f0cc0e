// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lexbill - billing milestone sweeps for law-firm staffing records.
//!
//! This is the binary entry point: the scheduling shell (`serve`), manual
//! sweep runs, and trigger review commands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod serve;
mod sweep;
mod trigger;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use lexbill_config::{ConfigError, LexbillConfig};
use lexbill_core::{ActionItemStatus, ActionType, LexbillError, TriggerStatus};

/// Exit code for "sweep already running" (EX_TEMPFAIL).
const EXIT_CONFLICT: u8 = 75;

/// Lexbill - billing milestone sweeps and trigger review.
#[derive(Parser, Debug)]
#[command(name = "lexbill", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sweep scheduler until SIGINT/SIGTERM.
    Serve,
    /// Run one sweep now.
    #[command(subcommand)]
    Sweep(SweepCommand),
    /// Review the trigger queue.
    #[command(subcommand)]
    Trigger(TriggerCommand),
}

#[derive(Subcommand, Debug)]
enum SweepCommand {
    /// Date-based sweep over explicit and fallback due dates.
    Date(DateSweepArgs),
    /// AI-assisted sweep over free-text due conditions.
    Ai(AiSweepArgs),
}

#[derive(Args, Debug, Default)]
struct DateSweepArgs {
    /// Report what would happen without writing anything.
    #[arg(long)]
    dry_run: bool,
    /// Maximum candidates (defaults to `date_sweep.limit`).
    #[arg(long)]
    limit: Option<u32>,
    /// Treat this date (YYYY-MM-DD) as today.
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Args, Debug, Default)]
struct AiSweepArgs {
    #[arg(long)]
    dry_run: bool,
    /// Maximum candidates (defaults to `ai_sweep.limit`).
    #[arg(long)]
    limit: Option<u32>,
    /// Milestones per classifier call (defaults to `ai_sweep.batch_size`).
    #[arg(long)]
    batch_size: Option<u32>,
    #[arg(long)]
    min_confidence: Option<f64>,
    #[arg(long)]
    auto_confirm_confidence: Option<f64>,
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
enum TriggerCommand {
    /// List trigger entries, newest first.
    List {
        #[arg(long)]
        status: Option<TriggerStatus>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// List action items, soonest due first.
    Actions {
        #[arg(long)]
        status: Option<ActionItemStatus>,
    },
    /// Confirm a pending trigger.
    Confirm {
        id: i64,
        /// Acting user id.
        #[arg(long)]
        user: Option<i64>,
    },
    /// Reject a pending trigger.
    Reject {
        id: i64,
        #[arg(long)]
        user: Option<i64>,
    },
    /// Edit the action item of a trigger.
    UpdateAction {
        id: i64,
        #[arg(long)]
        action_type: Option<ActionType>,
        #[arg(long)]
        description: Option<String>,
        /// YYYY-MM-DD or an RFC 3339 timestamp.
        #[arg(long)]
        due_date: Option<String>,
        #[arg(long)]
        status: Option<ActionItemStatus>,
        /// Staff id of the assignee.
        #[arg(long)]
        assign: Option<i64>,
    },
    /// Set a staffing project's status and queue triggers for its milestones.
    StatusChange { project_id: i64, status: String },
}

fn load_config(path: Option<&Path>) -> Result<LexbillConfig, Vec<ConfigError>> {
    match path {
        Some(path) => lexbill_config::load_and_validate_path(path),
        None => lexbill_config::load_and_validate(),
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
/// `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lexbill={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn exit_code(error: &LexbillError) -> ExitCode {
    if error.is_conflict() {
        ExitCode::from(EXIT_CONFLICT)
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            lexbill_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.service.log_level);

    let outcome = match cli.command {
        Commands::Serve => serve::run_serve(config, cli.config).await,
        Commands::Sweep(command) => sweep::run_sweep(&config, command).await,
        Commands::Trigger(command) => trigger::run_trigger(&config, command).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lexbill: {e}");
            exit_code(&e)
        }
    }
}
