// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger queue and action item state machine.
//!
//! A trigger moves `pending -> confirmed | rejected` exactly once. Every
//! transition runs in one transaction together with the milestone and action
//! item writes it implies, so no intermediate state is observable.
//!
//! The partial unique index on `(milestone_id, event_type)` over active rows
//! backs the existence check: inserts use `INSERT OR IGNORE` and a suppressed
//! insert is reported as `None`, never as an error.

use chrono::{Days, NaiveDate};
use lexbill_core::LexbillError;
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err, now_timestamp};
use crate::models::{
    ActionItem, ActionItemStatus, ActionItemUpdate, ActionType, AutoCompletion, CompletionSource,
    EventType, MatchMethod, NewTrigger, StatusChangeQueued, TriggerEntry, TriggerStatus,
};
use crate::queries::{ACTION_ITEM_COLUMNS, TRIGGER_COLUMNS, action_item_from_row, trigger_from_row};

/// Whether an active (pending or confirmed) trigger exists for the pair.
pub async fn has_active_trigger(
    db: &Database,
    milestone_id: i64,
    event_type: EventType,
) -> Result<bool, LexbillError> {
    let event_type = event_type.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM billing_trigger_queue
                     WHERE milestone_id = ?1 AND event_type = ?2
                       AND status IN ('pending', 'confirmed')
                 )",
                params![milestone_id, event_type],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a `pending` trigger. Returns `None` if an active one already exists.
pub async fn insert_pending_trigger(
    db: &Database,
    trigger: &NewTrigger,
) -> Result<Option<i64>, LexbillError> {
    let trigger = trigger.clone();
    db.connection()
        .call(move |conn| insert_trigger_row(conn, &trigger, TriggerStatus::Pending, None))
        .await
        .map_err(map_tr_err)
}

/// Atomically record an auto-confirmed trigger.
///
/// Inserts a `confirmed` trigger, completes the milestone if it is still
/// open, and creates the action item unless one exists for the trigger.
/// Returns `None` without writing anything when an active trigger already
/// exists for the pair.
pub async fn record_auto_confirmed(
    db: &Database,
    trigger: &NewTrigger,
    completion: &AutoCompletion,
) -> Result<Option<i64>, LexbillError> {
    let trigger = trigger.clone();
    let completion = completion.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(trigger_id) = insert_trigger_row(
                &tx,
                &trigger,
                TriggerStatus::Confirmed,
                Some(completion.action_type),
            )?
            else {
                return Ok(None);
            };

            complete_milestone(
                &tx,
                trigger.milestone_id,
                completion.completion_date,
                completion.completion_source,
            )?;

            tx.execute(
                "INSERT OR IGNORE INTO billing_action_item
                     (trigger_id, milestone_id, action_type, description, due_date, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                params![
                    trigger_id,
                    trigger.milestone_id,
                    completion.action_type.to_string(),
                    completion.action_type.default_description(),
                    completion.action_due_date,
                ],
            )?;

            tx.commit()?;
            Ok(Some(trigger_id))
        })
        .await
        .map_err(map_tr_err)
}

/// Confirm a pending trigger.
///
/// Derives the action type from the trigger's labels, completes the
/// milestone when the action is in the completion set, and upserts the
/// trigger's single action item without overwriting fields a person filled
/// in. `today` anchors the completion date and new due dates.
pub async fn confirm_trigger(
    db: &Database,
    trigger_id: i64,
    confirmed_by: Option<i64>,
    today: NaiveDate,
) -> Result<TriggerEntry, LexbillError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let trigger = match load_pending(&tx, trigger_id)? {
                Ok(trigger) => trigger,
                Err(e) => return Ok(Err(e)),
            };

            let action_type = ActionType::for_trigger(
                trigger.new_status.as_deref(),
                &trigger.event_type.to_string(),
            );

            tx.execute(
                "UPDATE billing_trigger_queue
                 SET status = 'confirmed', confirmed_by = ?1, confirmed_at = ?2, action_taken = ?3
                 WHERE id = ?4",
                params![confirmed_by, now_timestamp(), action_type.to_string(), trigger_id],
            )?;

            if action_type.completes_milestone() {
                complete_milestone(
                    &tx,
                    trigger.milestone_id,
                    today,
                    CompletionSource::TriggerConfirmed,
                )?;
            }

            let existing = load_action_item(&tx, trigger_id)?;
            match existing {
                Some(item) => {
                    tx.execute(
                        "UPDATE billing_action_item
                         SET action_type = COALESCE(action_type, ?1),
                             description = COALESCE(NULLIF(TRIM(description), ''), ?2),
                             due_date = COALESCE(due_date, ?3),
                             updated_at = ?4
                         WHERE id = ?5",
                        params![
                            action_type.to_string(),
                            action_type.default_description(),
                            due_in(today, action_type),
                            now_timestamp(),
                            item.id,
                        ],
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO billing_action_item
                             (trigger_id, milestone_id, action_type, description, due_date, status)
                         VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                        params![
                            trigger_id,
                            trigger.milestone_id,
                            action_type.to_string(),
                            action_type.default_description(),
                            due_in(today, action_type),
                        ],
                    )?;
                }
            }

            let updated = load_trigger(&tx, trigger_id)?;
            tx.commit()?;
            Ok(updated.ok_or(LexbillError::TriggerNotFound { id: trigger_id }))
        })
        .await
        .map_err(map_tr_err)?
}

/// Reject a pending trigger and cancel its still-pending action item.
pub async fn reject_trigger(
    db: &Database,
    trigger_id: i64,
    rejected_by: Option<i64>,
) -> Result<TriggerEntry, LexbillError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if let Err(e) = load_pending(&tx, trigger_id)? {
                return Ok(Err(e));
            }

            tx.execute(
                "UPDATE billing_trigger_queue
                 SET status = 'rejected', confirmed_by = ?1, confirmed_at = ?2
                 WHERE id = ?3",
                params![rejected_by, now_timestamp(), trigger_id],
            )?;
            tx.execute(
                "UPDATE billing_action_item
                 SET status = 'cancelled', completed_at = NULL, updated_at = ?1
                 WHERE trigger_id = ?2 AND status = 'pending'",
                params![now_timestamp(), trigger_id],
            )?;

            let updated = load_trigger(&tx, trigger_id)?;
            tx.commit()?;
            Ok(updated.ok_or(LexbillError::TriggerNotFound { id: trigger_id }))
        })
        .await
        .map_err(map_tr_err)?
}

/// Edit (or create) the action item of a trigger.
///
/// Unset fields keep their stored value. A missing due date is computed from
/// the action type only when none was ever stored. `completed_at` follows the
/// status: stamped on completion, cleared otherwise.
pub async fn update_action_item(
    db: &Database,
    trigger_id: i64,
    update: &ActionItemUpdate,
    today: NaiveDate,
) -> Result<ActionItem, LexbillError> {
    let update = update.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(trigger) = load_trigger(&tx, trigger_id)? else {
                return Ok(Err(LexbillError::TriggerNotFound { id: trigger_id }));
            };

            if let Some(staff_id) = update.assigned_to {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM staff WHERE id = ?1)",
                    params![staff_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Ok(Err(LexbillError::InvalidAssignee { staff_id }));
                }
            }

            let existing = load_action_item(&tx, trigger_id)?;
            let stored = existing.as_ref();

            let action_type = update
                .action_type
                .or_else(|| stored.and_then(|item| item.action_type))
                .unwrap_or_else(|| {
                    ActionType::for_trigger(
                        trigger.new_status.as_deref(),
                        &trigger.event_type.to_string(),
                    )
                });
            let description = update
                .description
                .clone()
                .or_else(|| stored.and_then(|item| item.description.clone()))
                .unwrap_or_else(|| action_type.default_description().to_string());
            let due_date = update
                .due_date
                .or_else(|| stored.and_then(|item| item.due_date))
                .unwrap_or_else(|| due_in(today, action_type));
            let status = update
                .status
                .or_else(|| stored.map(|item| item.status))
                .unwrap_or(ActionItemStatus::Pending);
            let assigned_to = update
                .assigned_to
                .or_else(|| stored.and_then(|item| item.assigned_to));
            let completed_at = match status {
                ActionItemStatus::Completed => Some(
                    stored
                        .and_then(|item| item.completed_at.clone())
                        .unwrap_or_else(now_timestamp),
                ),
                _ => None,
            };

            match stored {
                Some(item) => {
                    tx.execute(
                        "UPDATE billing_action_item
                         SET action_type = ?1, description = ?2, due_date = ?3, status = ?4,
                             assigned_to = ?5, completed_at = ?6, updated_at = ?7
                         WHERE id = ?8",
                        params![
                            action_type.to_string(),
                            description,
                            due_date,
                            status.to_string(),
                            assigned_to,
                            completed_at,
                            now_timestamp(),
                            item.id,
                        ],
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO billing_action_item
                             (trigger_id, milestone_id, action_type, description, due_date,
                              status, assigned_to, completed_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            trigger_id,
                            trigger.milestone_id,
                            action_type.to_string(),
                            description,
                            due_date,
                            status.to_string(),
                            assigned_to,
                            completed_at,
                        ],
                    )?;
                }
            }

            let item = load_action_item(&tx, trigger_id)?;
            tx.commit()?;
            Ok(item.ok_or_else(|| {
                LexbillError::Internal(format!("action item for trigger {trigger_id} vanished"))
            }))
        })
        .await
        .map_err(map_tr_err)?
}

/// Queue a pending trigger for every open milestone linked to a staffing
/// project whose status just changed.
pub async fn queue_status_change(
    db: &Database,
    staffing_project_id: i64,
    old_status: Option<&str>,
    new_status: &str,
) -> Result<StatusChangeQueued, LexbillError> {
    let old_status = old_status.map(str::to_string);
    let new_status = new_status.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let milestone_ids: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT DISTINCT m.id
                     FROM billing_milestone m
                     JOIN billing_engagement e ON e.id = m.engagement_id
                     JOIN billing_staffing_project_link l
                       ON l.billing_project_id = e.billing_project_id
                     WHERE l.staffing_project_id = ?1 AND m.completed = 0
                     ORDER BY m.id ASC",
                )?;
                let rows = stmt.query_map(params![staffing_project_id], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };

            let reason = match &old_status {
                Some(old) => format!("Project status changed from {old} to {new_status}"),
                None => format!("Project status changed to {new_status}"),
            };

            let mut queued = StatusChangeQueued::default();
            for milestone_id in milestone_ids {
                let trigger = NewTrigger {
                    milestone_id,
                    staffing_project_id: Some(staffing_project_id),
                    old_status: old_status.clone(),
                    new_status: Some(new_status.clone()),
                    event_type: EventType::ProjectStatusChange,
                    match_confidence: 1.0,
                    trigger_reason: Some(reason.clone()),
                    match_method: MatchMethod::StatusChange,
                    trigger_rule_id: None,
                };
                match insert_trigger_row(&tx, &trigger, TriggerStatus::Pending, None)? {
                    Some(id) => queued.trigger_ids.push(id),
                    None => queued.skipped_already_triggered += 1,
                }
            }

            tx.commit()?;
            Ok(queued)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a trigger by id.
pub async fn get_trigger(db: &Database, id: i64) -> Result<Option<TriggerEntry>, LexbillError> {
    db.connection()
        .call(move |conn| load_trigger(conn, id))
        .await
        .map_err(map_tr_err)
}

/// List triggers, optionally filtered by status, newest first.
pub async fn list_triggers(
    db: &Database,
    status: Option<TriggerStatus>,
    limit: u32,
) -> Result<Vec<TriggerEntry>, LexbillError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {TRIGGER_COLUMNS} FROM billing_trigger_queue
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status, limit], trigger_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// The action item of a trigger, if any.
pub async fn action_item_for_trigger(
    db: &Database,
    trigger_id: i64,
) -> Result<Option<ActionItem>, LexbillError> {
    db.connection()
        .call(move |conn| load_action_item(conn, trigger_id))
        .await
        .map_err(map_tr_err)
}

/// List action items, optionally filtered by status, soonest due first.
pub async fn list_action_items(
    db: &Database,
    status: Option<ActionItemStatus>,
) -> Result<Vec<ActionItem>, LexbillError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {ACTION_ITEM_COLUMNS} FROM billing_action_item
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY due_date IS NULL, due_date ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status], action_item_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

// --- transaction-scoped helpers ---

fn insert_trigger_row(
    conn: &Connection,
    trigger: &NewTrigger,
    status: TriggerStatus,
    action_taken: Option<ActionType>,
) -> rusqlite::Result<Option<i64>> {
    let confirmed_at = (status == TriggerStatus::Confirmed).then(now_timestamp);
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO billing_trigger_queue
             (milestone_id, staffing_project_id, old_status, new_status, event_type,
              match_confidence, trigger_reason, status, confirmed_at, action_taken,
              match_method, trigger_rule_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            trigger.milestone_id,
            trigger.staffing_project_id,
            trigger.old_status,
            trigger.new_status,
            trigger.event_type.to_string(),
            trigger.match_confidence,
            trigger.trigger_reason,
            status.to_string(),
            confirmed_at,
            action_taken.map(|a| a.to_string()),
            trigger.match_method.to_string(),
            trigger.trigger_rule_id,
            now_timestamp(),
        ],
    )?;
    Ok((inserted > 0).then(|| conn.last_insert_rowid()))
}

fn complete_milestone(
    conn: &Connection,
    milestone_id: i64,
    completion_date: NaiveDate,
    source: CompletionSource,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE billing_milestone
         SET completed = 1, completion_date = ?1, completion_source = ?2, updated_at = ?3
         WHERE id = ?4 AND completed = 0",
        params![completion_date, source.to_string(), now_timestamp(), milestone_id],
    )
}

fn load_trigger(conn: &Connection, id: i64) -> rusqlite::Result<Option<TriggerEntry>> {
    let sql = format!("SELECT {TRIGGER_COLUMNS} FROM billing_trigger_queue WHERE id = ?1");
    conn.query_row(&sql, params![id], trigger_from_row).optional()
}

/// Load a trigger that must exist and still be pending.
fn load_pending(
    conn: &Connection,
    id: i64,
) -> rusqlite::Result<Result<TriggerEntry, LexbillError>> {
    Ok(match load_trigger(conn, id)? {
        None => Err(LexbillError::TriggerNotFound { id }),
        Some(t) if t.status != TriggerStatus::Pending => Err(LexbillError::TriggerNotPending {
            id,
            status: t.status.to_string(),
        }),
        Some(t) => Ok(t),
    })
}

fn load_action_item(conn: &Connection, trigger_id: i64) -> rusqlite::Result<Option<ActionItem>> {
    let sql =
        format!("SELECT {ACTION_ITEM_COLUMNS} FROM billing_action_item WHERE trigger_id = ?1");
    conn.query_row(&sql, params![trigger_id], action_item_from_row)
        .optional()
}

fn due_in(today: NaiveDate, action_type: ActionType) -> NaiveDate {
    let days = action_type.default_due_offset_days().unsigned_abs();
    today.checked_add_days(Days::new(days)).unwrap_or(today)
}
