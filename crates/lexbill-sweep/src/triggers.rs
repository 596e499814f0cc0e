// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-facing trigger operations.
//!
//! Thin validation layer over the transactional state machine in
//! `lexbill_storage::queries::triggers`: it resolves "today", parses
//! user-supplied dates, and turns project status edits into queued triggers.

use chrono::{DateTime, NaiveDate, Utc};
use lexbill_core::{
    ActionItem, ActionItemStatus, ActionType, LexbillError, TriggerEntry, TriggerStatus,
};
use lexbill_storage::queries::{records, triggers};
use lexbill_storage::{ActionItemUpdate, Database, StatusChangeQueued};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Administrative edit of an action item as submitted by a user.
///
/// `due_date` is raw input: `YYYY-MM-DD` or an RFC 3339 timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionItemEdit {
    pub action_type: Option<ActionType>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<ActionItemStatus>,
    pub assigned_to: Option<i64>,
}

/// Parse a user-supplied due date. Blank input means "not supplied".
pub fn parse_due_date(value: &str) -> Result<Option<NaiveDate>, LexbillError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|ts| Some(ts.date_naive()))
        .map_err(|_| LexbillError::InvalidDueDate {
            value: value.to_string(),
        })
}

/// Confirm, reject, and edit trigger queue entries.
#[derive(Debug, Clone)]
pub struct TriggerService {
    db: Database,
}

impl TriggerService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Confirm a pending trigger as of the current UTC date.
    pub async fn confirm(
        &self,
        trigger_id: i64,
        acting_user: Option<i64>,
    ) -> Result<TriggerEntry, LexbillError> {
        self.confirm_on(trigger_id, acting_user, Utc::now().date_naive())
            .await
    }

    /// Confirm a pending trigger with an explicit "today".
    ///
    /// Fails with `TriggerNotFound` or `TriggerNotPending`; a trigger can be
    /// decided only once.
    pub async fn confirm_on(
        &self,
        trigger_id: i64,
        acting_user: Option<i64>,
        today: NaiveDate,
    ) -> Result<TriggerEntry, LexbillError> {
        let entry = triggers::confirm_trigger(&self.db, trigger_id, acting_user, today).await?;
        info!(
            trigger_id,
            milestone_id = entry.milestone_id,
            acting_user,
            action = entry.action_taken.as_deref().unwrap_or(""),
            "trigger confirmed"
        );
        Ok(entry)
    }

    /// Reject a pending trigger and cancel its pending action item.
    pub async fn reject(
        &self,
        trigger_id: i64,
        acting_user: Option<i64>,
    ) -> Result<TriggerEntry, LexbillError> {
        let entry = triggers::reject_trigger(&self.db, trigger_id, acting_user).await?;
        info!(trigger_id, milestone_id = entry.milestone_id, acting_user, "trigger rejected");
        Ok(entry)
    }

    /// Edit the action item of a trigger, creating it if needed.
    pub async fn update_action_item(
        &self,
        trigger_id: i64,
        edit: &ActionItemEdit,
    ) -> Result<ActionItem, LexbillError> {
        self.update_action_item_on(trigger_id, edit, Utc::now().date_naive())
            .await
    }

    /// [`Self::update_action_item`] with an explicit "today" for default due dates.
    pub async fn update_action_item_on(
        &self,
        trigger_id: i64,
        edit: &ActionItemEdit,
        today: NaiveDate,
    ) -> Result<ActionItem, LexbillError> {
        let due_date = match edit.due_date.as_deref() {
            Some(raw) => parse_due_date(raw)?,
            None => None,
        };
        let update = ActionItemUpdate {
            action_type: edit.action_type,
            description: edit.description.clone(),
            due_date,
            status: edit.status,
            assigned_to: edit.assigned_to,
        };
        triggers::update_action_item(&self.db, trigger_id, &update, today).await
    }

    /// Change a staffing project's status and queue triggers for its open
    /// milestones.
    ///
    /// Setting the status it already has queues nothing.
    pub async fn record_status_change(
        &self,
        staffing_project_id: i64,
        new_status: &str,
    ) -> Result<StatusChangeQueued, LexbillError> {
        let new_status = new_status.trim();
        if new_status.is_empty() {
            return Err(LexbillError::Validation(
                "project status must not be blank".to_string(),
            ));
        }
        let Some(old_status) =
            records::set_project_status(&self.db, staffing_project_id, new_status).await?
        else {
            return Err(LexbillError::Validation(format!(
                "staffing project {staffing_project_id} does not exist"
            )));
        };
        if old_status.trim().eq_ignore_ascii_case(new_status) {
            return Ok(StatusChangeQueued::default());
        }
        self.queue_status_change(staffing_project_id, Some(&old_status), new_status)
            .await
    }

    /// Queue status-change triggers without touching the project row.
    pub async fn queue_status_change(
        &self,
        staffing_project_id: i64,
        old_status: Option<&str>,
        new_status: &str,
    ) -> Result<StatusChangeQueued, LexbillError> {
        let queued =
            triggers::queue_status_change(&self.db, staffing_project_id, old_status, new_status)
                .await?;
        info!(
            project_id = staffing_project_id,
            new_status,
            queued = queued.trigger_ids.len(),
            skipped_already_triggered = queued.skipped_already_triggered,
            "status change triggers queued"
        );
        Ok(queued)
    }

    /// Trigger entries, newest first.
    pub async fn list_triggers(
        &self,
        status: Option<TriggerStatus>,
        limit: u32,
    ) -> Result<Vec<TriggerEntry>, LexbillError> {
        triggers::list_triggers(&self.db, status, limit).await
    }

    /// Action items, soonest due first.
    pub async fn list_action_items(
        &self,
        status: Option<ActionItemStatus>,
    ) -> Result<Vec<ActionItem>, LexbillError> {
        triggers::list_action_items(&self.db, status).await
    }
}
