// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record-level write paths for staff, projects, engagements, milestones, and
//! trigger rules. Used by manual entry and by test fixtures.

use lexbill_core::LexbillError;
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_timestamp};
use crate::models::{Milestone, NewMilestone, NewTriggerRule, TriggerRule};
use crate::queries::{MILESTONE_COLUMNS, milestone_from_row};

/// Insert a staff member. Returns the new staff id.
pub async fn insert_staff(db: &Database, name: &str) -> Result<i64, LexbillError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("INSERT INTO staff (name) VALUES (?1)", params![name])?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a staffing (operational) project. Returns the new project id.
pub async fn insert_staffing_project(
    db: &Database,
    name: &str,
    cm_number: Option<&str>,
    status: &str,
) -> Result<i64, LexbillError> {
    let name = name.to_string();
    let cm_number = cm_number.map(str::to_string);
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO projects (name, cm_number, status) VALUES (?1, ?2, ?3)",
                params![name, cm_number, status],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Set a staffing project's status label, returning the previous label.
///
/// Returns `None` when the project does not exist.
pub async fn set_project_status(
    db: &Database,
    project_id: i64,
    status: &str,
) -> Result<Option<String>, LexbillError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let old = match tx.query_row(
                "SELECT status FROM projects WHERE id = ?1",
                params![project_id],
                |row| row.get::<_, String>(0),
            ) {
                Ok(old) => old,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e),
            };
            tx.execute(
                "UPDATE projects SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, now_timestamp(), project_id],
            )?;
            tx.commit()?;
            Ok(Some(old))
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a billing project. Returns the new billing project id.
pub async fn insert_billing_project(
    db: &Database,
    project_name: &str,
    client_name: Option<&str>,
) -> Result<i64, LexbillError> {
    let project_name = project_name.to_string();
    let client_name = client_name.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO billing_project (project_name, client_name) VALUES (?1, ?2)",
                params![project_name, client_name],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Attach a C/M number to a billing project. Returns the new row id.
pub async fn insert_cm_no(
    db: &Database,
    billing_project_id: i64,
    cm_no: &str,
    is_primary: bool,
) -> Result<i64, LexbillError> {
    let cm_no = cm_no.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO billing_project_cm_no (billing_project_id, cm_no, is_primary)
                 VALUES (?1, ?2, ?3)",
                params![billing_project_id, cm_no, is_primary],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert an engagement, optionally pinned to one of the project's C/M numbers.
pub async fn insert_engagement(
    db: &Database,
    billing_project_id: i64,
    cm_id: Option<i64>,
    engagement_title: Option<&str>,
) -> Result<i64, LexbillError> {
    let engagement_title = engagement_title.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO billing_engagement (billing_project_id, cm_id, engagement_title)
                 VALUES (?1, ?2, ?3)",
                params![billing_project_id, cm_id, engagement_title],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a milestone. Returns the new milestone id.
pub async fn insert_milestone(
    db: &Database,
    milestone: &NewMilestone,
) -> Result<i64, LexbillError> {
    let m = milestone.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO billing_milestone
                     (engagement_id, title, trigger_text, raw_fragment, amount_value,
                      amount_currency, due_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    m.engagement_id,
                    m.title,
                    m.trigger_text,
                    m.raw_fragment,
                    m.amount_value,
                    m.amount_currency,
                    m.due_date,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a trigger rule. Returns the new rule id.
pub async fn insert_trigger_rule(
    db: &Database,
    rule: &NewTriggerRule,
) -> Result<i64, LexbillError> {
    let rule = rule.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO billing_milestone_trigger_rule
                     (milestone_id, fallback_due_date, auto_confirm, manual_confirm_required,
                      updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    rule.milestone_id,
                    rule.fallback_due_date,
                    rule.auto_confirm,
                    rule.manual_confirm_required,
                    now_timestamp(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// All trigger rules for a milestone, most recently updated first.
pub async fn trigger_rules_for_milestone(
    db: &Database,
    milestone_id: i64,
) -> Result<Vec<TriggerRule>, LexbillError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, milestone_id, fallback_due_date, auto_confirm,
                        manual_confirm_required, updated_at
                 FROM billing_milestone_trigger_rule
                 WHERE milestone_id = ?1
                 ORDER BY updated_at DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![milestone_id], |row| {
                Ok(TriggerRule {
                    id: row.get(0)?,
                    milestone_id: row.get(1)?,
                    fallback_due_date: row.get(2)?,
                    auto_confirm: row.get(3)?,
                    manual_confirm_required: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Get a milestone by id.
pub async fn get_milestone(db: &Database, id: i64) -> Result<Option<Milestone>, LexbillError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {MILESTONE_COLUMNS} FROM billing_milestone WHERE id = ?1");
            match conn.query_row(&sql, params![id], milestone_from_row) {
                Ok(milestone) => Ok(Some(milestone)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Whether a staff member with this id exists.
pub async fn staff_exists(db: &Database, staff_id: i64) -> Result<bool, LexbillError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM staff WHERE id = ?1)",
                params![staff_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}
