// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-facing record types.
//!
//! The canonical domain records live in `lexbill-core::types`; this module
//! re-exports them and adds the typed rows produced by candidate queries and
//! the inputs accepted by the record-level write paths.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use lexbill_core::types::{
    ActionItem, ActionItemStatus, ActionType, CompletionSource, EventType, MatchMethod,
    Milestone, StaffingLink, TriggerEntry, TriggerRule, TriggerStatus,
};

/// A milestone whose effective due date has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateSweepCandidate {
    pub milestone_id: i64,
    pub billing_project_id: i64,
    pub project_name: String,
    /// Matter number from the engagement, else the project's primary one.
    pub cm_no: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Explicit due date when present, else the earliest fallback rule date.
    pub effective_due_date: NaiveDate,
    /// Rule that supplied the fallback date, if one was used.
    pub trigger_rule_id: Option<i64>,
}

/// A milestone whose due condition lives only in free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSweepCandidate {
    pub milestone_id: i64,
    pub billing_project_id: i64,
    pub project_name: String,
    pub cm_no: Option<String>,
    pub title: Option<String>,
    pub trigger_text: Option<String>,
    pub raw_fragment: Option<String>,
    /// Most recently updated trigger rule, if any.
    pub trigger_rule_id: Option<i64>,
    pub rule_auto_confirm: bool,
    pub rule_manual_confirm_required: bool,
}

/// Fields for a new milestone row.
#[derive(Debug, Clone, Default)]
pub struct NewMilestone {
    pub engagement_id: i64,
    pub title: Option<String>,
    pub trigger_text: Option<String>,
    pub raw_fragment: Option<String>,
    pub amount_value: Option<f64>,
    pub amount_currency: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// Fields for a new trigger rule row.
#[derive(Debug, Clone, Default)]
pub struct NewTriggerRule {
    pub milestone_id: i64,
    pub fallback_due_date: Option<NaiveDate>,
    pub auto_confirm: bool,
    pub manual_confirm_required: bool,
}

/// Fields of a trigger-queue entry written by a sweep or status change.
#[derive(Debug, Clone)]
pub struct NewTrigger {
    pub milestone_id: i64,
    pub staffing_project_id: Option<i64>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub event_type: EventType,
    pub match_confidence: f64,
    pub trigger_reason: Option<String>,
    pub match_method: MatchMethod,
    pub trigger_rule_id: Option<i64>,
}

/// Milestone completion and follow-up applied with an auto-confirmed trigger.
#[derive(Debug, Clone)]
pub struct AutoCompletion {
    pub completion_source: CompletionSource,
    pub completion_date: NaiveDate,
    pub action_type: ActionType,
    pub action_due_date: NaiveDate,
}

/// Administrative edit to a trigger's action item. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ActionItemUpdate {
    pub action_type: Option<ActionType>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<ActionItemStatus>,
    pub assigned_to: Option<i64>,
}

/// Outcome of queueing triggers for a staffing-project status change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeQueued {
    /// Ids of newly created pending triggers.
    pub trigger_ids: Vec<i64>,
    /// Milestones that already had an active status-change trigger.
    pub skipped_already_triggered: u32,
}
