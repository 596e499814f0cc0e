// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Billing project to staffing project resolution.

use std::collections::HashMap;

use lexbill_core::LexbillError;
use lexbill_storage::Database;
use lexbill_storage::queries::links;
use tracing::debug;

/// Where a candidate's trigger should point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub staffing_project_id: i64,
    /// The link was derived from the C/M number by this lookup.
    pub auto_linked: bool,
}

/// Resolves staffing projects for one sweep run.
///
/// In dry-run mode auto-links are remembered instead of written, so later
/// candidates of the same billing project see the link exactly as they
/// would in a real run.
#[derive(Debug)]
pub struct StaffingResolver<'a> {
    db: &'a Database,
    dry_run: bool,
    simulated: HashMap<i64, i64>,
}

impl<'a> StaffingResolver<'a> {
    pub fn new(db: &'a Database, dry_run: bool) -> Self {
        Self {
            db,
            dry_run,
            simulated: HashMap::new(),
        }
    }

    /// Resolve the staffing project for a billing project.
    ///
    /// An existing link always wins. Otherwise the C/M number must match
    /// exactly one staffing project, and a link with score 1.0 is created.
    /// Zero or several matches resolve to `None`.
    pub async fn resolve(
        &mut self,
        billing_project_id: i64,
        cm_no: Option<&str>,
    ) -> Result<Option<Resolution>, LexbillError> {
        if let Some(&staffing_project_id) = self.simulated.get(&billing_project_id) {
            return Ok(Some(Resolution {
                staffing_project_id,
                auto_linked: false,
            }));
        }
        if let Some(link) = links::find_link(self.db, billing_project_id).await? {
            return Ok(Some(Resolution {
                staffing_project_id: link.staffing_project_id,
                auto_linked: false,
            }));
        }

        let Some(cm_no) = cm_no.map(str::trim).filter(|cm| !cm.is_empty()) else {
            return Ok(None);
        };

        let matches = links::find_projects_by_cm_number(self.db, cm_no).await?;
        let [staffing_project_id] = matches[..] else {
            debug!(
                billing_project_id,
                cm_no,
                matches = matches.len(),
                "no unique staffing project for C/M number"
            );
            return Ok(None);
        };

        if self.dry_run {
            self.simulated.insert(billing_project_id, staffing_project_id);
        } else {
            let note = format!("Auto-linked by C/M number {cm_no}");
            links::insert_link(
                self.db,
                billing_project_id,
                staffing_project_id,
                Some(1.0),
                Some(&note),
            )
            .await?;
        }
        debug!(
            billing_project_id,
            staffing_project_id,
            cm_no,
            dry_run = self.dry_run,
            "auto-linked staffing project"
        );

        Ok(Some(Resolution {
            staffing_project_id,
            auto_linked: true,
        }))
    }
}
