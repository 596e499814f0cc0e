// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Billing-to-staffing project links and matter-number lookup.

use lexbill_core::LexbillError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now_timestamp};
use crate::models::StaffingLink;
use crate::queries::{LINK_COLUMNS, link_from_row};

/// The preferred existing link for a billing project.
///
/// Highest match score wins; manual links without a score rank last, then
/// the oldest link.
pub async fn find_link(
    db: &Database,
    billing_project_id: i64,
) -> Result<Option<StaffingLink>, LexbillError> {
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {LINK_COLUMNS} FROM billing_staffing_project_link
                 WHERE billing_project_id = ?1
                 ORDER BY auto_match_score IS NULL, auto_match_score DESC, id ASC
                 LIMIT 1"
            );
            conn.query_row(&sql, params![billing_project_id], link_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All links pointing at a staffing project.
pub async fn links_for_staffing_project(
    db: &Database,
    staffing_project_id: i64,
) -> Result<Vec<StaffingLink>, LexbillError> {
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {LINK_COLUMNS} FROM billing_staffing_project_link
                 WHERE staffing_project_id = ?1 ORDER BY id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![staffing_project_id], link_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Ids of staffing projects whose C/M number equals `cm_no` exactly.
///
/// Surrounding whitespace is ignored on both sides; case is significant.
pub async fn find_projects_by_cm_number(
    db: &Database,
    cm_no: &str,
) -> Result<Vec<i64>, LexbillError> {
    let cm_no = cm_no.trim().to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM projects WHERE TRIM(cm_number) = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![cm_no], |row| row.get(0))?;
            rows.collect::<Result<Vec<i64>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a link unless the pair is already linked.
///
/// Returns the new link id, or `None` when the pair already existed.
pub async fn insert_link(
    db: &Database,
    billing_project_id: i64,
    staffing_project_id: i64,
    auto_match_score: Option<f64>,
    notes: Option<&str>,
) -> Result<Option<i64>, LexbillError> {
    let notes = notes.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO billing_staffing_project_link
                     (billing_project_id, staffing_project_id, auto_match_score, notes, linked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    billing_project_id,
                    staffing_project_id,
                    auto_match_score,
                    notes,
                    now_timestamp(),
                ],
            )?;
            Ok((inserted > 0).then(|| conn.last_insert_rowid()))
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::records;

    #[tokio::test]
    async fn insert_link_is_idempotent_per_pair() {
        let db = Database::open_in_memory().await.unwrap();
        let bp = records::insert_billing_project(&db, "Atlas", None).await.unwrap();
        let p = records::insert_staffing_project(&db, "Atlas", Some("CM-100"), "Active")
            .await
            .unwrap();

        let first = insert_link(&db, bp, p, Some(1.0), Some("auto")).await.unwrap();
        assert!(first.is_some());
        let second = insert_link(&db, bp, p, Some(1.0), Some("auto")).await.unwrap();
        assert!(second.is_none());

        let link = find_link(&db, bp).await.unwrap().expect("link exists");
        assert_eq!(link.staffing_project_id, p);
        assert_eq!(link.auto_match_score, Some(1.0));
        assert_eq!(links_for_staffing_project(&db, p).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scored_links_are_preferred_over_unscored() {
        let db = Database::open_in_memory().await.unwrap();
        let bp = records::insert_billing_project(&db, "Atlas", None).await.unwrap();
        let manual = records::insert_staffing_project(&db, "Atlas (old)", None, "Active")
            .await
            .unwrap();
        let scored = records::insert_staffing_project(&db, "Atlas", None, "Active")
            .await
            .unwrap();
        insert_link(&db, bp, manual, None, None).await.unwrap();
        insert_link(&db, bp, scored, Some(0.9), None).await.unwrap();

        let link = find_link(&db, bp).await.unwrap().unwrap();
        assert_eq!(link.staffing_project_id, scored);
    }

    #[tokio::test]
    async fn cm_number_match_is_exact() {
        let db = Database::open_in_memory().await.unwrap();
        let p = records::insert_staffing_project(&db, "Atlas", Some(" CM-100 "), "Active")
            .await
            .unwrap();
        records::insert_staffing_project(&db, "Atlas II", Some("CM-1000"), "Active")
            .await
            .unwrap();

        assert_eq!(find_projects_by_cm_number(&db, "CM-100").await.unwrap(), vec![p]);
        assert!(find_projects_by_cm_number(&db, "cm-100").await.unwrap().is_empty());
    }
}
