// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Billing domain types shared across adapter traits and the sweep services.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Classifier,
}

/// Which actor marked a milestone as completed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompletionSource {
    /// A user edited the milestone directly.
    ManualEdit,
    /// A human (or auto-confirm path) confirmed a trigger-queue entry.
    TriggerConfirmed,
    /// The date-based sweep found the due date had passed.
    DateSweepAuto,
    /// The AI-assisted sweep inferred the milestone was due with high confidence.
    AiSweepAuto,
}

/// Distinguishes the producers of trigger-queue entries.
///
/// At most one active entry may exist per (milestone, event type).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MilestoneDateDue,
    MilestoneAiDue,
    ProjectStatusChange,
}

/// How a trigger-queue entry was matched to its milestone.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    DateRule,
    AiInference,
    StatusChange,
}

/// Lifecycle status of a trigger-queue entry.
///
/// `Pending` transitions exactly once to `Confirmed` or `Rejected`; both are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl TriggerStatus {
    /// Active entries participate in the per-(milestone, event type) dedup guard.
    pub fn is_active(self) -> bool {
        matches!(self, TriggerStatus::Pending | TriggerStatus::Confirmed)
    }
}

/// Follow-up task kind spawned by a confirmed trigger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    IssueInvoice,
    FollowUpPayment,
    PauseBilling,
    GeneralFollowup,
}

/// Status or event labels and the action each one spawns once confirmed.
///
/// Matching is case-insensitive on the trimmed label.
pub const ACTION_TYPE_TABLE: &[(&str, ActionType)] = &[
    ("closed", ActionType::IssueInvoice),
    ("milestone due", ActionType::IssueInvoice),
    ("milestone_date_due", ActionType::IssueInvoice),
    ("milestone_ai_due", ActionType::IssueInvoice),
    ("terminated", ActionType::FollowUpPayment),
    ("suspended", ActionType::PauseBilling),
    ("on hold", ActionType::PauseBilling),
];

impl ActionType {
    /// Looks up a single label in [`ACTION_TYPE_TABLE`].
    pub fn for_label(label: &str) -> Option<ActionType> {
        let needle = label.trim().to_lowercase();
        ACTION_TYPE_TABLE
            .iter()
            .find(|(known, _)| *known == needle)
            .map(|(_, action)| *action)
    }

    /// Derives the action for a trigger from its new-status label, then its
    /// event type, falling back to [`ActionType::GeneralFollowup`].
    pub fn for_trigger(new_status: Option<&str>, event_type: &str) -> ActionType {
        new_status
            .and_then(ActionType::for_label)
            .or_else(|| ActionType::for_label(event_type))
            .unwrap_or(ActionType::GeneralFollowup)
    }

    /// Actions in the completion set mark the milestone completed on confirmation.
    pub fn completes_milestone(self) -> bool {
        matches!(self, ActionType::IssueInvoice | ActionType::FollowUpPayment)
    }

    /// Days from confirmation until a newly created action item is due.
    pub fn default_due_offset_days(self) -> i64 {
        match self {
            ActionType::IssueInvoice => 7,
            ActionType::FollowUpPayment => 14,
            ActionType::PauseBilling => 3,
            ActionType::GeneralFollowup => 7,
        }
    }

    /// Human-readable default description for a new action item.
    pub fn default_description(self) -> &'static str {
        match self {
            ActionType::IssueInvoice => "Issue invoice for completed milestone",
            ActionType::FollowUpPayment => "Follow up on outstanding payment",
            ActionType::PauseBilling => "Pause billing for this engagement",
            ActionType::GeneralFollowup => "Review billing follow-up",
        }
    }
}

/// Status of an action item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionItemStatus {
    Pending,
    Completed,
    Cancelled,
}

/// A billable checkpoint within a legal engagement.
///
/// `completed = true` implies `completion_date` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: i64,
    pub engagement_id: i64,
    pub title: Option<String>,
    pub trigger_text: Option<String>,
    pub raw_fragment: Option<String>,
    pub amount_value: Option<f64>,
    pub amount_currency: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub completion_date: Option<NaiveDate>,
    pub completion_source: Option<CompletionSource>,
    pub invoice_sent_date: Option<NaiveDate>,
    pub payment_received_date: Option<NaiveDate>,
    pub updated_at: String,
}

/// Optional per-milestone trigger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRule {
    pub id: i64,
    pub milestone_id: i64,
    pub fallback_due_date: Option<NaiveDate>,
    pub auto_confirm: bool,
    pub manual_confirm_required: bool,
    pub updated_at: String,
}

/// A recorded determination that a milestone is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEntry {
    pub id: i64,
    pub milestone_id: i64,
    pub staffing_project_id: Option<i64>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub event_type: EventType,
    pub match_confidence: f64,
    pub trigger_reason: Option<String>,
    pub status: TriggerStatus,
    pub confirmed_by: Option<i64>,
    pub confirmed_at: Option<String>,
    pub action_taken: Option<String>,
    pub match_method: MatchMethod,
    pub trigger_rule_id: Option<i64>,
    pub created_at: String,
}

/// A follow-up task spawned by a confirmed trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub id: i64,
    pub trigger_id: i64,
    pub milestone_id: i64,
    pub action_type: Option<ActionType>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: ActionItemStatus,
    pub assigned_to: Option<i64>,
    pub completed_at: Option<String>,
}

/// Association between a billing project and a staffing project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffingLink {
    pub id: i64,
    pub billing_project_id: i64,
    pub staffing_project_id: i64,
    pub auto_match_score: Option<f64>,
    pub notes: Option<String>,
    pub linked_at: String,
}

// --- AI classifier boundary ---

/// One milestone as presented to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestonePrompt {
    /// Position within the batch; echoed back by the classifier.
    pub index: usize,
    pub milestone_id: i64,
    pub project_name: String,
    pub cm_no: Option<String>,
    pub title: Option<String>,
    pub trigger_text: Option<String>,
    pub raw_fragment: Option<String>,
}

/// A batch of milestones to evaluate against an as-of date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    /// ISO `YYYY-MM-DD` date the classifier should treat as today.
    pub as_of_date: String,
    pub milestones: Vec<MilestonePrompt>,
}
