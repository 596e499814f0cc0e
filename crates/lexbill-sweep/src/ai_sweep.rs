// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI-assisted milestone sweep.
//!
//! Targets open milestones with no explicit or fallback date, whose due-ness
//! has to be read from free text. Candidates go to the classifier in batches.
//! Verdicts below the minimum confidence are dropped, verdicts above the
//! auto-confirm threshold are applied directly, and everything in between is
//! queued as a pending trigger for a person to review.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use lexbill_core::{
    ActionType, CompletionSource, EventType, LexbillError, MatchMethod, MilestoneClassifier,
};
use lexbill_storage::queries::{candidates, triggers};
use lexbill_storage::{AiSweepCandidate, AutoCompletion, Database, NewTrigger};
use tracing::{debug, info, warn};

use crate::evaluation::{Evaluation, build_request, parse_evaluations, round_confidence};
use crate::lock::{AI_SWEEP_LOCK, SweepLocks};
use crate::options::{AiSweepOptions, AiSweepResult};
use crate::resolver::StaffingResolver;
use crate::retry::RetryPolicy;

const DUE_STATUS_LABEL: &str = "Milestone Due";

/// Thresholds resolved from the options for one run.
#[derive(Debug, Clone, Copy)]
struct Thresholds {
    min_confidence: f64,
    auto_confirm_confidence: f64,
}

enum Outcome {
    Confirmed { auto_linked: bool },
    PendingReview { auto_linked: bool },
    AlreadyTriggered,
    NoStaffingProject,
}

/// Whether a verdict may be applied without human review.
///
/// A rule demanding manual confirmation always wins. Otherwise an explicit
/// auto-confirm rule or a confidence at the threshold is enough.
pub fn should_auto_confirm(
    candidate: &AiSweepCandidate,
    confidence: f64,
    auto_confirm_confidence: f64,
) -> bool {
    !candidate.rule_manual_confirm_required
        && (candidate.rule_auto_confirm || confidence >= auto_confirm_confidence)
}

fn trigger_reason(evaluation: &Evaluation) -> String {
    let reason = evaluation
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("AI inferred the milestone is due");
    match &evaluation.parsed_date {
        Some(date) => format!("{reason} (parsed date {date})"),
        None => reason.to_string(),
    }
}

/// Orchestrates AI sweep runs.
pub struct AiSweep {
    db: Database,
    classifier: Option<Arc<dyn MilestoneClassifier>>,
    retry: RetryPolicy,
    locks: SweepLocks,
}

impl AiSweep {
    /// A sweep guarded by the process-wide lock set.
    ///
    /// With no classifier every run is a no-op reporting `ai_enabled: false`.
    pub fn new(db: Database, classifier: Option<Arc<dyn MilestoneClassifier>>) -> Self {
        Self {
            db,
            classifier,
            retry: RetryPolicy::default(),
            locks: SweepLocks::global().clone(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_locks(mut self, locks: SweepLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn ai_enabled(&self) -> bool {
        self.classifier.is_some()
    }

    /// Run the sweep.
    ///
    /// Fails with [`LexbillError::SweepLock`] if another AI sweep holds the
    /// lock. Classifier failures and per-candidate failures are counted in
    /// `errors`, never returned.
    pub async fn run(&self, options: &AiSweepOptions) -> Result<AiSweepResult, LexbillError> {
        self.locks
            .with_lock(AI_SWEEP_LOCK, || self.sweep(options))
            .await
    }

    async fn sweep(&self, options: &AiSweepOptions) -> Result<AiSweepResult, LexbillError> {
        let mut result = AiSweepResult {
            dry_run: options.dry_run,
            ..Default::default()
        };
        let Some(classifier) = self.classifier.as_deref() else {
            info!(sweep = AI_SWEEP_LOCK, "no classifier configured, AI sweep skipped");
            return Ok(result);
        };
        result.ai_enabled = true;

        let as_of = options.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let thresholds = Thresholds {
            min_confidence: options.effective_min_confidence(),
            auto_confirm_confidence: options.effective_auto_confirm_confidence(),
        };
        let candidates =
            candidates::ai_sweep_candidates(&self.db, options.effective_limit()).await?;
        result.scanned = candidates.len() as u32;

        let mut open = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match triggers::has_active_trigger(
                &self.db,
                candidate.milestone_id,
                EventType::MilestoneAiDue,
            )
            .await
            {
                Ok(true) => result.skipped_already_triggered += 1,
                Ok(false) => open.push(candidate),
                Err(e) => {
                    warn!(
                        milestone_id = candidate.milestone_id,
                        project_id = candidate.billing_project_id,
                        error = %e,
                        "AI sweep trigger check failed"
                    );
                    result.errors += 1;
                }
            }
        }

        let mut resolver = StaffingResolver::new(&self.db, options.dry_run);
        for (batch_no, batch) in open.chunks(options.effective_batch_size()).enumerate() {
            let request = build_request(as_of, batch);
            let request = &request;
            let text = match self.retry.run(move || classifier.classify(request)).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        batch = batch_no,
                        size = batch.len(),
                        first_milestone_id = batch.first().map(|c| c.milestone_id),
                        error = %e,
                        "classifier batch failed after retries"
                    );
                    result.errors += batch.len() as u32;
                    continue;
                }
            };

            let evaluations = parse_evaluations(&text, batch.len());
            debug!(
                batch = batch_no,
                size = batch.len(),
                evaluations = evaluations.len(),
                "batch classified"
            );

            for evaluation in evaluations.iter().filter(|e| e.due) {
                let candidate = &batch[evaluation.index];
                result.ai_flagged_due += 1;
                if evaluation.confidence < thresholds.min_confidence {
                    debug!(
                        milestone_id = candidate.milestone_id,
                        confidence = evaluation.confidence,
                        "due verdict below minimum confidence"
                    );
                    result.skipped_low_confidence += 1;
                    continue;
                }

                match self
                    .process(
                        &mut resolver,
                        candidate,
                        evaluation,
                        thresholds,
                        as_of,
                        options.dry_run,
                    )
                    .await
                {
                    Ok(Outcome::Confirmed { auto_linked }) => {
                        result.confirmed += 1;
                        result.auto_linked += u32::from(auto_linked);
                    }
                    Ok(Outcome::PendingReview { auto_linked }) => {
                        result.pending_review += 1;
                        result.auto_linked += u32::from(auto_linked);
                    }
                    Ok(Outcome::AlreadyTriggered) => result.skipped_already_triggered += 1,
                    Ok(Outcome::NoStaffingProject) => result.skipped_no_staffing_project += 1,
                    Err(e) => {
                        warn!(
                            milestone_id = candidate.milestone_id,
                            project_id = candidate.billing_project_id,
                            project = %candidate.project_name,
                            error = %e,
                            "AI sweep failed for milestone"
                        );
                        result.errors += 1;
                    }
                }
            }
        }
        result.processed = result.confirmed + result.pending_review;

        info!(
            sweep = AI_SWEEP_LOCK,
            %as_of,
            dry_run = result.dry_run,
            scanned = result.scanned,
            ai_flagged_due = result.ai_flagged_due,
            confirmed = result.confirmed,
            pending_review = result.pending_review,
            auto_linked = result.auto_linked,
            skipped_low_confidence = result.skipped_low_confidence,
            skipped_no_staffing_project = result.skipped_no_staffing_project,
            skipped_already_triggered = result.skipped_already_triggered,
            errors = result.errors,
            "AI sweep finished"
        );
        Ok(result)
    }

    async fn process(
        &self,
        resolver: &mut StaffingResolver<'_>,
        candidate: &AiSweepCandidate,
        evaluation: &Evaluation,
        thresholds: Thresholds,
        as_of: NaiveDate,
        dry_run: bool,
    ) -> Result<Outcome, LexbillError> {
        let milestone_id = candidate.milestone_id;
        let Some(resolution) = resolver
            .resolve(candidate.billing_project_id, candidate.cm_no.as_deref())
            .await?
        else {
            debug!(milestone_id, cm_no = ?candidate.cm_no, "no staffing project for milestone");
            return Ok(Outcome::NoStaffingProject);
        };
        let auto_linked = resolution.auto_linked;

        let auto = should_auto_confirm(
            candidate,
            evaluation.confidence,
            thresholds.auto_confirm_confidence,
        );
        if dry_run {
            return Ok(if auto {
                Outcome::Confirmed { auto_linked }
            } else {
                Outcome::PendingReview { auto_linked }
            });
        }

        let trigger = NewTrigger {
            milestone_id,
            staffing_project_id: Some(resolution.staffing_project_id),
            old_status: None,
            new_status: Some(DUE_STATUS_LABEL.to_string()),
            event_type: EventType::MilestoneAiDue,
            match_confidence: round_confidence(evaluation.confidence),
            trigger_reason: Some(trigger_reason(evaluation)),
            match_method: MatchMethod::AiInference,
            trigger_rule_id: candidate.trigger_rule_id,
        };

        let inserted = if auto {
            let completion = AutoCompletion {
                completion_source: CompletionSource::AiSweepAuto,
                completion_date: as_of,
                action_type: ActionType::IssueInvoice,
                action_due_date: as_of.checked_add_days(Days::new(1)).ok_or_else(|| {
                    LexbillError::Internal(format!("date overflow after {as_of}"))
                })?,
            };
            triggers::record_auto_confirmed(&self.db, &trigger, &completion).await?
        } else {
            triggers::insert_pending_trigger(&self.db, &trigger).await?
        };

        let Some(trigger_id) = inserted else {
            return Ok(Outcome::AlreadyTriggered);
        };
        debug!(
            milestone_id,
            trigger_id,
            auto,
            confidence = evaluation.confidence,
            "AI trigger recorded"
        );
        Ok(if auto {
            Outcome::Confirmed { auto_linked }
        } else {
            Outcome::PendingReview { auto_linked }
        })
    }
}
