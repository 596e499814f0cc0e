// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Billing milestone sweeps for Lexbill.
//!
//! Two orchestrators scan open milestones and feed the trigger queue: the
//! [`DateSweep`] for milestones with an explicit or fallback due date, and
//! the [`AiSweep`] for milestones whose due condition is free text. Each is
//! guarded by a named run-once lock. [`TriggerService`] carries the human
//! side of the queue: confirm, reject, and action item edits.

pub mod ai_sweep;
pub mod date_sweep;
pub mod evaluation;
pub mod lock;
pub mod options;
pub mod resolver;
pub mod retry;
pub mod triggers;

pub use ai_sweep::AiSweep;
pub use date_sweep::DateSweep;
pub use lock::{AI_SWEEP_LOCK, DATE_SWEEP_LOCK, SweepLockGuard, SweepLocks};
pub use options::{AiSweepOptions, AiSweepResult, DateSweepOptions, DateSweepResult};
pub use resolver::{Resolution, StaffingResolver};
pub use retry::RetryPolicy;
pub use triggers::{ActionItemEdit, TriggerService};
