// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate fetchers for the two milestone sweeps.
//!
//! Both queries join milestone -> engagement -> billing project and resolve a
//! matter number: the engagement's own C/M number when it has one, else the
//! project's primary (then lowest-id) C/M number.

use chrono::NaiveDate;
use lexbill_core::LexbillError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{AiSweepCandidate, DateSweepCandidate};

const CM_NO_EXPR: &str = "COALESCE(
        ecm.cm_no,
        (SELECT c.cm_no FROM billing_project_cm_no c
          WHERE c.billing_project_id = bp.id
          ORDER BY c.is_primary DESC, c.id ASC
          LIMIT 1)
    )";

/// Incomplete milestones whose effective due date is on or before `as_of`.
///
/// The effective due date is the explicit due date, else the earliest
/// fallback rule date (ties broken by rule id). Ordered by effective due date,
/// then milestone id.
pub async fn date_sweep_candidates(
    db: &Database,
    as_of: NaiveDate,
    limit: u32,
) -> Result<Vec<DateSweepCandidate>, LexbillError> {
    let sql = format!(
        "WITH fallback AS (
             SELECT id AS rule_id, milestone_id, fallback_due_date,
                    ROW_NUMBER() OVER (
                        PARTITION BY milestone_id ORDER BY fallback_due_date ASC, id ASC
                    ) AS rn
             FROM billing_milestone_trigger_rule
             WHERE fallback_due_date IS NOT NULL
         ),
         candidate AS (
             SELECT m.id AS milestone_id,
                    bp.id AS billing_project_id,
                    bp.project_name,
                    {CM_NO_EXPR} AS cm_no,
                    m.due_date,
                    COALESCE(m.due_date, f.fallback_due_date) AS effective_due_date,
                    CASE WHEN m.due_date IS NULL THEN f.rule_id END AS trigger_rule_id
             FROM billing_milestone m
             JOIN billing_engagement e ON e.id = m.engagement_id
             JOIN billing_project bp ON bp.id = e.billing_project_id
             LEFT JOIN billing_project_cm_no ecm ON ecm.id = e.cm_id
             LEFT JOIN fallback f ON f.milestone_id = m.id AND f.rn = 1
             WHERE m.completed = 0
         )
         SELECT milestone_id, billing_project_id, project_name, cm_no, due_date,
                effective_due_date, trigger_rule_id
         FROM candidate
         WHERE effective_due_date IS NOT NULL AND effective_due_date <= ?1
         ORDER BY effective_due_date ASC, milestone_id ASC
         LIMIT ?2"
    );

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![as_of, limit], |row| {
                Ok(DateSweepCandidate {
                    milestone_id: row.get(0)?,
                    billing_project_id: row.get(1)?,
                    project_name: row.get(2)?,
                    cm_no: row.get(3)?,
                    due_date: row.get(4)?,
                    effective_due_date: row.get(5)?,
                    trigger_rule_id: row.get(6)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Incomplete milestones whose due condition exists only as free text.
///
/// Excludes milestones with an explicit due date or any fallback rule date,
/// and milestones whose title, trigger text, and raw fragment are all blank.
/// The rule flags come from the most recently updated rule. Ordered by
/// milestone update time, newest first.
pub async fn ai_sweep_candidates(
    db: &Database,
    limit: u32,
) -> Result<Vec<AiSweepCandidate>, LexbillError> {
    let sql = format!(
        "WITH latest_rule AS (
             SELECT id AS rule_id, milestone_id, auto_confirm, manual_confirm_required,
                    ROW_NUMBER() OVER (
                        PARTITION BY milestone_id ORDER BY updated_at DESC, id DESC
                    ) AS rn
             FROM billing_milestone_trigger_rule
         )
         SELECT m.id, bp.id, bp.project_name, {CM_NO_EXPR} AS cm_no,
                m.title, m.trigger_text, m.raw_fragment,
                r.rule_id,
                COALESCE(r.auto_confirm, 0),
                COALESCE(r.manual_confirm_required, 0)
         FROM billing_milestone m
         JOIN billing_engagement e ON e.id = m.engagement_id
         JOIN billing_project bp ON bp.id = e.billing_project_id
         LEFT JOIN billing_project_cm_no ecm ON ecm.id = e.cm_id
         LEFT JOIN latest_rule r ON r.milestone_id = m.id AND r.rn = 1
         WHERE m.completed = 0
           AND m.due_date IS NULL
           AND NOT EXISTS (
               SELECT 1 FROM billing_milestone_trigger_rule fr
               WHERE fr.milestone_id = m.id AND fr.fallback_due_date IS NOT NULL
           )
           AND (TRIM(COALESCE(m.title, '')) <> ''
                OR TRIM(COALESCE(m.trigger_text, '')) <> ''
                OR TRIM(COALESCE(m.raw_fragment, '')) <> '')
         ORDER BY m.updated_at DESC, m.id DESC
         LIMIT ?1"
    );

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(AiSweepCandidate {
                    milestone_id: row.get(0)?,
                    billing_project_id: row.get(1)?,
                    project_name: row.get(2)?,
                    cm_no: row.get(3)?,
                    title: row.get(4)?,
                    trigger_text: row.get(5)?,
                    raw_fragment: row.get(6)?,
                    trigger_rule_id: row.get(7)?,
                    rule_auto_confirm: row.get(8)?,
                    rule_manual_confirm_required: row.get(9)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewMilestone, NewTriggerRule};
    use crate::queries::records;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn engagement(db: &Database, cm: Option<&str>) -> i64 {
        let bp = records::insert_billing_project(db, "Project Atlas", None)
            .await
            .unwrap();
        let cm_id = match cm {
            Some(cm) => Some(records::insert_cm_no(db, bp, cm, true).await.unwrap()),
            None => None,
        };
        records::insert_engagement(db, bp, cm_id, None).await.unwrap()
    }

    async fn milestone(db: &Database, engagement_id: i64, due: Option<NaiveDate>) -> i64 {
        records::insert_milestone(
            db,
            &NewMilestone {
                engagement_id,
                title: Some("upon completion of listing".into()),
                due_date: due,
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    async fn fallback(db: &Database, milestone_id: i64, on: NaiveDate) -> i64 {
        records::insert_trigger_rule(
            db,
            &NewTriggerRule {
                milestone_id,
                fallback_due_date: Some(on),
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn explicit_due_date_wins_over_fallback() {
        let db = Database::open_in_memory().await.unwrap();
        let e = engagement(&db, Some("CM-100")).await;
        let m = milestone(&db, e, Some(date(2025, 1, 10))).await;
        fallback(&db, m, date(2025, 1, 1)).await;

        let before = date_sweep_candidates(&db, date(2025, 1, 5), 10).await.unwrap();
        assert!(before.is_empty(), "explicit date 2025-01-10 is not yet due");

        let after = date_sweep_candidates(&db, date(2025, 1, 10), 10).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].effective_due_date, date(2025, 1, 10));
        assert_eq!(after[0].cm_no.as_deref(), Some("CM-100"));
        assert!(after[0].trigger_rule_id.is_none());
    }

    #[tokio::test]
    async fn earliest_fallback_is_used_without_explicit_date() {
        let db = Database::open_in_memory().await.unwrap();
        let e = engagement(&db, None).await;
        let m = milestone(&db, e, None).await;
        fallback(&db, m, date(2025, 3, 1)).await;
        let earliest = fallback(&db, m, date(2025, 2, 1)).await;

        let rows = date_sweep_candidates(&db, date(2025, 2, 15), 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].effective_due_date, date(2025, 2, 1));
        assert_eq!(rows[0].trigger_rule_id, Some(earliest));
        assert!(rows[0].cm_no.is_none());
    }

    #[tokio::test]
    async fn date_candidates_are_ordered_and_limited() {
        let db = Database::open_in_memory().await.unwrap();
        let e = engagement(&db, Some("CM-1")).await;
        let late = milestone(&db, e, Some(date(2024, 5, 20))).await;
        let first_due = milestone(&db, e, Some(date(2024, 5, 1))).await;
        let second_due = milestone(&db, e, Some(date(2024, 5, 1))).await;
        milestone(&db, e, Some(date(2024, 7, 1))).await;
        milestone(&db, e, None).await;

        let rows = date_sweep_candidates(&db, date(2024, 6, 1), 10).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.milestone_id).collect();
        assert_eq!(ids, vec![first_due, second_due, late]);

        let limited = date_sweep_candidates(&db, date(2024, 6, 1), 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn ai_candidates_skip_dated_and_blank_milestones() {
        let db = Database::open_in_memory().await.unwrap();
        let e = engagement(&db, Some("CM-7")).await;
        let textual = milestone(&db, e, None).await;
        milestone(&db, e, Some(date(2025, 1, 1))).await;
        let with_fallback = milestone(&db, e, None).await;
        fallback(&db, with_fallback, date(2025, 4, 1)).await;
        records::insert_milestone(
            &db,
            &NewMilestone {
                engagement_id: e,
                title: Some("   ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let rows = ai_sweep_candidates(&db, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].milestone_id, textual);
        assert_eq!(rows[0].cm_no.as_deref(), Some("CM-7"));
        assert!(rows[0].trigger_rule_id.is_none());
        assert!(!rows[0].rule_auto_confirm);
    }

    #[tokio::test]
    async fn ai_candidates_carry_latest_rule_flags() {
        let db = Database::open_in_memory().await.unwrap();
        let e = engagement(&db, None).await;
        let m = milestone(&db, e, None).await;
        records::insert_trigger_rule(
            &db,
            &NewTriggerRule {
                milestone_id: m,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let latest = records::insert_trigger_rule(
            &db,
            &NewTriggerRule {
                milestone_id: m,
                auto_confirm: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let rows = ai_sweep_candidates(&db, 10).await.unwrap();
        assert_eq!(rows[0].trigger_rule_id, Some(latest));
        assert!(rows[0].rule_auto_confirm);
        assert!(!rows[0].rule_manual_confirm_required);
    }
}
