// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Date-based milestone sweep.
//!
//! Deterministic: a milestone is due once its effective due date is on or
//! before the as-of date, and every due milestone with a staffing project is
//! auto-confirmed. Candidates are processed one at a time with no shared
//! transaction, so a failed candidate never blocks the rest and a re-run
//! picks up where a crashed run stopped.

use chrono::{Days, NaiveDate, Utc};
use lexbill_core::{ActionType, CompletionSource, EventType, LexbillError, MatchMethod};
use lexbill_storage::queries::{candidates, triggers};
use lexbill_storage::{AutoCompletion, Database, DateSweepCandidate, NewTrigger};
use tracing::{debug, info, warn};

use crate::lock::{DATE_SWEEP_LOCK, SweepLocks};
use crate::options::{DateSweepOptions, DateSweepResult};
use crate::resolver::StaffingResolver;

/// New-status label written on date sweep triggers.
const DUE_STATUS_LABEL: &str = "Milestone Due";

enum Outcome {
    Processed { auto_linked: bool },
    AlreadyTriggered,
    NoStaffingProject,
}

/// Orchestrates one date sweep run at a time per lock set.
#[derive(Debug, Clone)]
pub struct DateSweep {
    db: Database,
    locks: SweepLocks,
}

impl DateSweep {
    /// A sweep guarded by the process-wide lock set.
    pub fn new(db: Database) -> Self {
        Self::with_locks(db, SweepLocks::global().clone())
    }

    pub fn with_locks(db: Database, locks: SweepLocks) -> Self {
        Self { db, locks }
    }

    /// Run the sweep.
    ///
    /// Fails with [`LexbillError::SweepLock`] if another date sweep holds the
    /// lock. Per-candidate failures are counted in `errors`, never returned.
    pub async fn run(&self, options: &DateSweepOptions) -> Result<DateSweepResult, LexbillError> {
        self.locks
            .with_lock(DATE_SWEEP_LOCK, || self.sweep(options))
            .await
    }

    async fn sweep(&self, options: &DateSweepOptions) -> Result<DateSweepResult, LexbillError> {
        let as_of = options.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let limit = options.effective_limit();
        let candidates = candidates::date_sweep_candidates(&self.db, as_of, limit).await?;

        let mut result = DateSweepResult {
            dry_run: options.dry_run,
            scanned: candidates.len() as u32,
            ..Default::default()
        };

        let mut resolver = StaffingResolver::new(&self.db, options.dry_run);
        for candidate in &candidates {
            match self
                .process(&mut resolver, candidate, as_of, options.dry_run)
                .await
            {
                Ok(Outcome::Processed { auto_linked }) => {
                    result.processed += 1;
                    if auto_linked {
                        result.auto_linked += 1;
                    }
                }
                Ok(Outcome::AlreadyTriggered) => result.skipped_already_triggered += 1,
                Ok(Outcome::NoStaffingProject) => result.skipped_no_staffing_project += 1,
                Err(e) => {
                    warn!(
                        milestone_id = candidate.milestone_id,
                        project_id = candidate.billing_project_id,
                        project = %candidate.project_name,
                        error = %e,
                        "date sweep failed for milestone"
                    );
                    result.errors += 1;
                }
            }
        }

        info!(
            sweep = DATE_SWEEP_LOCK,
            %as_of,
            dry_run = result.dry_run,
            scanned = result.scanned,
            processed = result.processed,
            auto_linked = result.auto_linked,
            skipped_no_staffing_project = result.skipped_no_staffing_project,
            skipped_already_triggered = result.skipped_already_triggered,
            errors = result.errors,
            "date sweep finished"
        );
        Ok(result)
    }

    async fn process(
        &self,
        resolver: &mut StaffingResolver<'_>,
        candidate: &DateSweepCandidate,
        as_of: NaiveDate,
        dry_run: bool,
    ) -> Result<Outcome, LexbillError> {
        let milestone_id = candidate.milestone_id;
        if triggers::has_active_trigger(&self.db, milestone_id, EventType::MilestoneDateDue)
            .await?
        {
            debug!(milestone_id, "milestone already triggered");
            return Ok(Outcome::AlreadyTriggered);
        }

        let Some(resolution) = resolver
            .resolve(candidate.billing_project_id, candidate.cm_no.as_deref())
            .await?
        else {
            debug!(milestone_id, cm_no = ?candidate.cm_no, "no staffing project for milestone");
            return Ok(Outcome::NoStaffingProject);
        };

        if dry_run {
            return Ok(Outcome::Processed {
                auto_linked: resolution.auto_linked,
            });
        }

        let trigger = NewTrigger {
            milestone_id,
            staffing_project_id: Some(resolution.staffing_project_id),
            old_status: None,
            new_status: Some(DUE_STATUS_LABEL.to_string()),
            event_type: EventType::MilestoneDateDue,
            match_confidence: 1.0,
            trigger_reason: Some(format!(
                "Milestone due date {} has passed",
                candidate.effective_due_date
            )),
            match_method: MatchMethod::DateRule,
            trigger_rule_id: candidate.trigger_rule_id,
        };
        let completion = AutoCompletion {
            completion_source: CompletionSource::DateSweepAuto,
            completion_date: as_of,
            action_type: ActionType::IssueInvoice,
            action_due_date: as_of
                .checked_add_days(Days::new(1))
                .ok_or_else(|| LexbillError::Internal(format!("date overflow after {as_of}")))?,
        };

        match triggers::record_auto_confirmed(&self.db, &trigger, &completion).await? {
            Some(trigger_id) => {
                debug!(milestone_id, trigger_id, "milestone auto-confirmed by date");
                Ok(Outcome::Processed {
                    auto_linked: resolution.auto_linked,
                })
            }
            // Another writer inserted an active trigger after the existence check.
            None => Ok(Outcome::AlreadyTriggered),
        }
    }
}
