// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lexbill staffing and billing tracker.
//!
//! This crate provides the error taxonomy, the billing domain types, and the
//! adapter traits (storage, AI classifier) used throughout the workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LexbillError;
pub use types::{
    ActionItem, ActionItemStatus, ActionType, AdapterType, ClassificationRequest,
    CompletionSource, EventType, HealthStatus, MatchMethod, Milestone, MilestonePrompt,
    StaffingLink, TriggerEntry, TriggerRule, TriggerStatus,
};

pub use traits::{MilestoneClassifier, PluginAdapter, StorageAdapter};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn lock_conflict_is_distinct_from_domain_errors() {
        let conflict = LexbillError::SweepLock {
            name: "billing-date-sweep".into(),
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_domain());
        assert_eq!(
            conflict.to_string(),
            "sweep `billing-date-sweep` is already running"
        );

        let not_pending = LexbillError::TriggerNotPending {
            id: 4,
            status: "confirmed".into(),
        };
        assert!(not_pending.is_domain());
        assert_eq!(not_pending.to_string(), "Trigger is not pending");
        assert_eq!(
            LexbillError::TriggerNotFound { id: 9 }.to_string(),
            "Trigger not found"
        );
    }

    #[test]
    fn tags_use_snake_case_strings() {
        assert_eq!(CompletionSource::DateSweepAuto.to_string(), "date_sweep_auto");
        assert_eq!(CompletionSource::AiSweepAuto.to_string(), "ai_sweep_auto");
        assert_eq!(
            CompletionSource::TriggerConfirmed.to_string(),
            "trigger_confirmed"
        );
        assert_eq!(EventType::MilestoneDateDue.to_string(), "milestone_date_due");
        assert_eq!(MatchMethod::AiInference.to_string(), "ai_inference");
        assert_eq!(
            TriggerStatus::from_str("rejected").unwrap(),
            TriggerStatus::Rejected
        );
        assert_eq!(
            ActionItemStatus::from_str("cancelled").unwrap(),
            ActionItemStatus::Cancelled
        );
    }

    #[test]
    fn action_type_lookup_prefers_status_over_event() {
        assert_eq!(
            ActionType::for_trigger(Some("Closed"), "project_status_change"),
            ActionType::IssueInvoice
        );
        assert_eq!(
            ActionType::for_trigger(Some("  TERMINATED "), "project_status_change"),
            ActionType::FollowUpPayment
        );
        assert_eq!(
            ActionType::for_trigger(Some("Suspended"), "project_status_change"),
            ActionType::PauseBilling
        );
        assert_eq!(
            ActionType::for_trigger(None, "milestone_ai_due"),
            ActionType::IssueInvoice
        );
        assert_eq!(
            ActionType::for_trigger(Some("Active"), "project_status_change"),
            ActionType::GeneralFollowup
        );
    }

    #[test]
    fn completion_set_and_offsets() {
        assert!(ActionType::IssueInvoice.completes_milestone());
        assert!(ActionType::FollowUpPayment.completes_milestone());
        assert!(!ActionType::PauseBilling.completes_milestone());
        assert!(!ActionType::GeneralFollowup.completes_milestone());

        assert_eq!(ActionType::IssueInvoice.default_due_offset_days(), 7);
        assert_eq!(ActionType::FollowUpPayment.default_due_offset_days(), 14);
        assert_eq!(ActionType::PauseBilling.default_due_offset_days(), 3);
    }

    #[test]
    fn only_pending_and_confirmed_are_active() {
        assert!(TriggerStatus::Pending.is_active());
        assert!(TriggerStatus::Confirmed.is_active());
        assert!(!TriggerStatus::Rejected.is_active());
    }

    #[test]
    fn classification_request_serializes_camel_case() {
        let request = ClassificationRequest {
            as_of_date: "2025-03-01".into(),
            milestones: vec![MilestonePrompt {
                index: 0,
                milestone_id: 12,
                project_name: "Project Atlas".into(),
                cm_no: Some("CM-100".into()),
                title: Some("(b) upon listing".into()),
                trigger_text: None,
                raw_fragment: None,
            }],
        };
        let json = serde_json::to_value(&request).expect("should serialize");
        assert_eq!(json["asOfDate"], "2025-03-01");
        assert_eq!(json["milestones"][0]["milestoneId"], 12);
        assert_eq!(json["milestones"][0]["cmNo"], "CM-100");
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_classifier<T: MilestoneClassifier>() {}
    }
}
