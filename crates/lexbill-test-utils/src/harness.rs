// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-file database harness for integration tests.
//!
//! `TestDb` opens a migrated SQLite database inside a temp directory that
//! lives as long as the harness, and offers short fixture builders for the
//! billing and staffing records the sweeps read.

use chrono::NaiveDate;
use lexbill_core::LexbillError;
use lexbill_storage::queries::{links, records};
use lexbill_storage::{Database, NewMilestone, NewTriggerRule};
use rusqlite::types::Value;

/// A billing project with one engagement, ready to hold milestones.
#[derive(Debug, Clone, Copy)]
pub struct BillingFixture {
    pub billing_project_id: i64,
    pub engagement_id: i64,
}

/// Migrated database in a temp directory.
pub struct TestDb {
    db: Database,
    _temp_dir: tempfile::TempDir,
}

impl TestDb {
    /// Create an empty, migrated database.
    pub async fn new() -> Result<Self, LexbillError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| LexbillError::Storage { source: e.into() })?;
        let path = temp_dir.path().join("lexbill-test.db");
        let db = Database::open(&path.to_string_lossy()).await?;
        Ok(Self {
            db,
            _temp_dir: temp_dir,
        })
    }

    /// Handle to the database; clones share the same connection.
    pub fn db(&self) -> Database {
        self.db.clone()
    }

    /// A billing project carrying `cm_no` as its primary C/M number, plus one
    /// engagement under that number.
    pub async fn billing_project(
        &self,
        name: &str,
        cm_no: Option<&str>,
    ) -> Result<BillingFixture, LexbillError> {
        let billing_project_id = records::insert_billing_project(&self.db, name, None).await?;
        let cm_id = match cm_no {
            Some(cm) => Some(records::insert_cm_no(&self.db, billing_project_id, cm, true).await?),
            None => None,
        };
        let engagement_id =
            records::insert_engagement(&self.db, billing_project_id, cm_id, Some("Engagement"))
                .await?;
        Ok(BillingFixture {
            billing_project_id,
            engagement_id,
        })
    }

    /// A staffing project in `Active` status.
    pub async fn staffing_project(
        &self,
        name: &str,
        cm_number: Option<&str>,
    ) -> Result<i64, LexbillError> {
        records::insert_staffing_project(&self.db, name, cm_number, "Active").await
    }

    pub async fn staff(&self, name: &str) -> Result<i64, LexbillError> {
        records::insert_staff(&self.db, name).await
    }

    /// A manual link without a match score.
    pub async fn link(
        &self,
        billing_project_id: i64,
        staffing_project_id: i64,
    ) -> Result<(), LexbillError> {
        links::insert_link(&self.db, billing_project_id, staffing_project_id, None, None).await?;
        Ok(())
    }

    /// An open milestone with an explicit due date.
    pub async fn dated_milestone(
        &self,
        engagement_id: i64,
        due_date: Option<NaiveDate>,
    ) -> Result<i64, LexbillError> {
        records::insert_milestone(
            &self.db,
            &NewMilestone {
                engagement_id,
                title: Some("Fee instalment".into()),
                amount_value: Some(50_000.0),
                amount_currency: Some("HKD".into()),
                due_date,
                ..Default::default()
            },
        )
        .await
    }

    /// An open milestone with no date whose due condition is `trigger_text`.
    pub async fn text_milestone(
        &self,
        engagement_id: i64,
        trigger_text: &str,
    ) -> Result<i64, LexbillError> {
        records::insert_milestone(
            &self.db,
            &NewMilestone {
                engagement_id,
                title: Some("Fee instalment".into()),
                trigger_text: Some(trigger_text.into()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn trigger_rule(&self, rule: NewTriggerRule) -> Result<i64, LexbillError> {
        records::insert_trigger_rule(&self.db, &rule).await
    }

    /// Run raw SQL, for fault injection and fixtures the builders lack.
    pub async fn execute(&self, sql: &str) -> Result<(), LexbillError> {
        let sql = sql.to_string();
        self.db
            .connection()
            .call(move |conn| conn.execute_batch(&sql))
            .await
            .map_err(lexbill_storage::database::map_tr_err)
    }

    /// Row count of `table`.
    pub async fn count(&self, table: &'static str) -> Result<i64, LexbillError> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        self.db
            .connection()
            .call(move |conn| conn.query_row(&sql, [], |row| row.get(0)))
            .await
            .map_err(lexbill_storage::database::map_tr_err)
    }

    /// Every row of `table` in id order, each rendered column by column.
    ///
    /// Two equal snapshots mean the table was not modified in between.
    pub async fn snapshot(&self, table: &'static str) -> Result<Vec<String>, LexbillError> {
        let sql = format!("SELECT * FROM {table} ORDER BY id");
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let width = stmt.column_count();
                let rows = stmt.query_map([], |row| {
                    let cells = (0..width)
                        .map(|i| row.get::<_, Value>(i).map(|v| format!("{v:?}")))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(cells.join("|"))
                })?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await
            .map_err(lexbill_storage::database::map_tr_err)
    }
}
