// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules over the billing schema.

pub mod candidates;
pub mod links;
pub mod records;
pub mod triggers;

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

use crate::models::{ActionItem, Milestone, StaffingLink, TriggerEntry};

/// Read a text column holding a snake_case tag.
pub(crate) fn tag<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Nullable variant of [`tag`].
pub(crate) fn opt_tag<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) const MILESTONE_COLUMNS: &str = "id, engagement_id, title, trigger_text, raw_fragment,
     amount_value, amount_currency, due_date, completed, completion_date,
     completion_source, invoice_sent_date, payment_received_date, updated_at";

pub(crate) fn milestone_from_row(row: &Row<'_>) -> rusqlite::Result<Milestone> {
    Ok(Milestone {
        id: row.get(0)?,
        engagement_id: row.get(1)?,
        title: row.get(2)?,
        trigger_text: row.get(3)?,
        raw_fragment: row.get(4)?,
        amount_value: row.get(5)?,
        amount_currency: row.get(6)?,
        due_date: row.get(7)?,
        completed: row.get(8)?,
        completion_date: row.get(9)?,
        completion_source: opt_tag(row, 10)?,
        invoice_sent_date: row.get(11)?,
        payment_received_date: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub(crate) const TRIGGER_COLUMNS: &str = "id, milestone_id, staffing_project_id, old_status,
     new_status, event_type, match_confidence, trigger_reason, status, confirmed_by,
     confirmed_at, action_taken, match_method, trigger_rule_id, created_at";

pub(crate) fn trigger_from_row(row: &Row<'_>) -> rusqlite::Result<TriggerEntry> {
    Ok(TriggerEntry {
        id: row.get(0)?,
        milestone_id: row.get(1)?,
        staffing_project_id: row.get(2)?,
        old_status: row.get(3)?,
        new_status: row.get(4)?,
        event_type: tag(row, 5)?,
        match_confidence: row.get(6)?,
        trigger_reason: row.get(7)?,
        status: tag(row, 8)?,
        confirmed_by: row.get(9)?,
        confirmed_at: row.get(10)?,
        action_taken: row.get(11)?,
        match_method: tag(row, 12)?,
        trigger_rule_id: row.get(13)?,
        created_at: row.get(14)?,
    })
}

pub(crate) const ACTION_ITEM_COLUMNS: &str = "id, trigger_id, milestone_id, action_type,
     description, due_date, status, assigned_to, completed_at";

pub(crate) fn action_item_from_row(row: &Row<'_>) -> rusqlite::Result<ActionItem> {
    Ok(ActionItem {
        id: row.get(0)?,
        trigger_id: row.get(1)?,
        milestone_id: row.get(2)?,
        action_type: opt_tag(row, 3)?,
        description: row.get(4)?,
        due_date: row.get(5)?,
        status: tag(row, 6)?,
        assigned_to: row.get(7)?,
        completed_at: row.get(8)?,
    })
}

pub(crate) const LINK_COLUMNS: &str =
    "id, billing_project_id, staffing_project_id, auto_match_score, notes, linked_at";

pub(crate) fn link_from_row(row: &Row<'_>) -> rusqlite::Result<StaffingLink> {
    Ok(StaffingLink {
        id: row.get(0)?,
        billing_project_id: row.get(1)?,
        staffing_project_id: row.get(2)?,
        auto_match_score: row.get(3)?,
        notes: row.get(4)?,
        linked_at: row.get(5)?,
    })
}
