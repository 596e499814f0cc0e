// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the AI-assisted sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use lexbill_core::{
    ActionType, CompletionSource, EventType, LexbillError, MatchMethod, MilestoneClassifier,
    TriggerStatus,
};
use lexbill_storage::NewTriggerRule;
use lexbill_storage::queries::{records, triggers};
use lexbill_sweep::{
    AI_SWEEP_LOCK, AiSweep, AiSweepOptions, DateSweep, DateSweepOptions, RetryPolicy, SweepLocks,
};
use lexbill_test_utils::{GatedClassifier, ScriptedClassifier, TestDb, overloaded, verdicts};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(1),
        ..RetryPolicy::default()
    }
}

fn sweep_with(test_db: &TestDb, classifier: Arc<ScriptedClassifier>) -> AiSweep {
    let classifier: Arc<dyn MilestoneClassifier> = classifier;
    AiSweep::new(test_db.db(), Some(classifier))
        .with_retry(fast_retry())
        .with_locks(SweepLocks::new())
}

fn options() -> AiSweepOptions {
    AiSweepOptions {
        as_of: Some(date(2025, 3, 1)),
        ..Default::default()
    }
}

/// One linked billing project with a single free-text milestone.
async fn single_candidate(test_db: &TestDb) -> i64 {
    let billing = test_db.billing_project("Project Atlas", Some("CM-100")).await.unwrap();
    test_db.staffing_project("Atlas IPO", Some("CM-100")).await.unwrap();
    test_db
        .text_milestone(billing.engagement_id, "上市申請遞交後 / upon filing of the A1 application")
        .await
        .unwrap()
}

#[tokio::test]
async fn missing_classifier_is_a_disabled_no_op() {
    let test_db = TestDb::new().await.unwrap();
    single_candidate(&test_db).await;

    let sweep = AiSweep::new(test_db.db(), None).with_locks(SweepLocks::new());
    assert!(!sweep.ai_enabled());
    let result = sweep.run(&options()).await.unwrap();
    assert!(!result.ai_enabled);
    assert_eq!(result.scanned, 0);
    assert_eq!(result.processed, 0);
    assert_eq!(test_db.count("billing_trigger_queue").await.unwrap(), 0);
}

#[tokio::test]
async fn low_confidence_verdict_is_discarded() {
    let test_db = TestDb::new().await.unwrap();
    single_candidate(&test_db).await;
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![verdicts(&[(0, true, 0.70)])]));

    let result = sweep_with(&test_db, classifier).run(&options()).await.unwrap();
    assert!(result.ai_enabled);
    assert_eq!(result.ai_flagged_due, 1);
    assert_eq!(result.skipped_low_confidence, 1);
    assert_eq!(result.processed, 0);
    assert_eq!(test_db.count("billing_trigger_queue").await.unwrap(), 0);
}

#[tokio::test]
async fn mid_confidence_verdict_is_queued_for_review() {
    let test_db = TestDb::new().await.unwrap();
    let db = test_db.db();
    let milestone = single_candidate(&test_db).await;
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![verdicts(&[(0, true, 0.80)])]));

    let result = sweep_with(&test_db, classifier).run(&options()).await.unwrap();
    assert_eq!(result.pending_review, 1);
    assert_eq!(result.confirmed, 0);
    assert_eq!(result.processed, 1);
    assert_eq!(result.auto_linked, 1);

    let entries = triggers::list_triggers(&db, Some(TriggerStatus::Pending), 10)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event_type, EventType::MilestoneAiDue);
    assert_eq!(entries[0].match_method, MatchMethod::AiInference);
    assert_eq!(entries[0].match_confidence, 0.8);

    assert!(!records::get_milestone(&db, milestone).await.unwrap().unwrap().completed);
    assert_eq!(test_db.count("billing_action_item").await.unwrap(), 0);
}

#[tokio::test]
async fn thresholds_compare_the_reported_confidence_unrounded() {
    // 0.7451 would round up to the minimum; it must still be discarded.
    let test_db = TestDb::new().await.unwrap();
    single_candidate(&test_db).await;
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![verdicts(&[(
        0, true, 0.7451,
    )])]));
    let result = sweep_with(&test_db, classifier).run(&options()).await.unwrap();
    assert_eq!(result.skipped_low_confidence, 1);
    assert_eq!(result.pending_review, 0);
    assert_eq!(test_db.count("billing_trigger_queue").await.unwrap(), 0);

    // 0.9151 would round up to the auto-confirm threshold; it must stay pending.
    let test_db = TestDb::new().await.unwrap();
    let db = test_db.db();
    let milestone = single_candidate(&test_db).await;
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![verdicts(&[(
        0, true, 0.9151,
    )])]));
    let result = sweep_with(&test_db, classifier).run(&options()).await.unwrap();
    assert_eq!(result.pending_review, 1);
    assert_eq!(result.confirmed, 0);

    let entries = triggers::list_triggers(&db, None, 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, TriggerStatus::Pending);
    assert_eq!(entries[0].match_confidence, 0.92);
    assert!(!records::get_milestone(&db, milestone).await.unwrap().unwrap().completed);
    assert_eq!(test_db.count("billing_action_item").await.unwrap(), 0);
}

#[tokio::test]
async fn high_confidence_verdict_is_applied() {
    let test_db = TestDb::new().await.unwrap();
    let db = test_db.db();
    let milestone = single_candidate(&test_db).await;
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![verdicts(&[(
        0, true, 0.954,
    )])]));

    let result = sweep_with(&test_db, classifier).run(&options()).await.unwrap();
    assert_eq!(result.confirmed, 1);
    assert_eq!(result.pending_review, 0);

    let entries = triggers::list_triggers(&db, None, 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, TriggerStatus::Confirmed);
    assert_eq!(entries[0].match_confidence, 0.95);

    let record = records::get_milestone(&db, milestone).await.unwrap().unwrap();
    assert!(record.completed);
    assert_eq!(record.completion_source, Some(CompletionSource::AiSweepAuto));

    let items = triggers::list_action_items(&db, None).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].action_type, Some(ActionType::IssueInvoice));
    assert_eq!(items[0].due_date, Some(date(2025, 3, 2)));
}

#[tokio::test]
async fn rule_flags_override_the_confidence_threshold() {
    let test_db = TestDb::new().await.unwrap();
    let db = test_db.db();
    let billing = test_db.billing_project("Atlas", Some("CM-100")).await.unwrap();
    test_db.staffing_project("Atlas ops", Some("CM-100")).await.unwrap();
    let eager = test_db.text_milestone(billing.engagement_id, "upon signing").await.unwrap();
    test_db
        .trigger_rule(NewTriggerRule {
            milestone_id: eager,
            auto_confirm: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let careful = test_db.text_milestone(billing.engagement_id, "upon listing").await.unwrap();
    test_db
        .trigger_rule(NewTriggerRule {
            milestone_id: careful,
            auto_confirm: true,
            manual_confirm_required: true,
            ..Default::default()
        })
        .await
        .unwrap();

    // Newest first: `careful` is index 0, `eager` index 1.
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![verdicts(&[
        (0, true, 0.99),
        (1, true, 0.80),
    ])]));
    let result = sweep_with(&test_db, Arc::clone(&classifier))
        .run(&options())
        .await
        .unwrap();
    let requests = classifier.requests().await;
    assert_eq!(requests[0].milestones[0].milestone_id, careful);

    assert_eq!(result.confirmed, 1);
    assert_eq!(result.pending_review, 1);
    assert!(records::get_milestone(&db, eager).await.unwrap().unwrap().completed);
    assert!(!records::get_milestone(&db, careful).await.unwrap().unwrap().completed);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let test_db = TestDb::new().await.unwrap();
    single_candidate(&test_db).await;
    let classifier = Arc::new(ScriptedClassifier::with_script(vec![
        Err(overloaded()),
        Err(overloaded()),
        Ok(verdicts(&[(0, true, 0.80)])),
    ]));

    let result = sweep_with(&test_db, Arc::clone(&classifier))
        .run(&options())
        .await
        .unwrap();
    assert_eq!(classifier.calls(), 3);
    assert_eq!(result.errors, 0);
    assert_eq!(result.pending_review, 1);
}

#[tokio::test]
async fn exhausted_retries_abandon_the_whole_batch() {
    let test_db = TestDb::new().await.unwrap();
    let billing = test_db.billing_project("Atlas", Some("CM-100")).await.unwrap();
    test_db.staffing_project("Atlas ops", Some("CM-100")).await.unwrap();
    for text in ["upon signing", "upon filing", "upon listing"] {
        test_db.text_milestone(billing.engagement_id, text).await.unwrap();
    }
    let classifier = Arc::new(ScriptedClassifier::with_script(vec![
        Err(overloaded()),
        Err(overloaded()),
        Err(overloaded()),
        Ok(verdicts(&[(0, true, 0.99)])),
    ]));

    let result = sweep_with(&test_db, Arc::clone(&classifier))
        .run(&AiSweepOptions {
            batch_size: Some(2),
            ..options()
        })
        .await
        .unwrap();
    // First batch of two fails three times; the second batch succeeds.
    assert_eq!(classifier.calls(), 4);
    assert_eq!(result.scanned, 3);
    assert_eq!(result.errors, 2);
    assert_eq!(result.confirmed, 1);
    assert_eq!(test_db.count("billing_trigger_queue").await.unwrap(), 1);
}

#[tokio::test]
async fn malformed_reply_yields_no_evaluations() {
    let test_db = TestDb::new().await.unwrap();
    single_candidate(&test_db).await;
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![
        r#"{"results": [{"index": 0, "due": true, "confidence": "very"}]}"#.to_string(),
    ]));

    let result = sweep_with(&test_db, Arc::clone(&classifier))
        .run(&options())
        .await
        .unwrap();
    assert_eq!(classifier.calls(), 1);
    assert_eq!(result.errors, 0);
    assert_eq!(result.ai_flagged_due, 0);
    assert_eq!(result.processed, 0);
    assert_eq!(test_db.count("billing_trigger_queue").await.unwrap(), 0);
}

#[tokio::test]
async fn candidates_are_batched_with_batch_local_indices() {
    let test_db = TestDb::new().await.unwrap();
    let billing = test_db.billing_project("Atlas", Some("CM-100")).await.unwrap();
    test_db.staffing_project("Atlas ops", Some("CM-100")).await.unwrap();
    for i in 0..5 {
        test_db
            .text_milestone(billing.engagement_id, &format!("instalment {i} upon filing"))
            .await
            .unwrap();
    }
    let classifier = Arc::new(ScriptedClassifier::new());

    let result = sweep_with(&test_db, Arc::clone(&classifier))
        .run(&AiSweepOptions {
            batch_size: Some(2),
            ..options()
        })
        .await
        .unwrap();
    assert_eq!(result.scanned, 5);

    let requests = classifier.requests().await;
    let sizes: Vec<usize> = requests.iter().map(|r| r.milestones.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    for request in &requests {
        assert_eq!(request.as_of_date, "2025-03-01");
        assert_eq!(request.milestones[0].index, 0);
    }
}

#[tokio::test]
async fn already_queued_milestones_skip_the_classifier() {
    let test_db = TestDb::new().await.unwrap();
    single_candidate(&test_db).await;
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![verdicts(&[(0, true, 0.80)])]));
    let sweep = sweep_with(&test_db, Arc::clone(&classifier));

    let first = sweep.run(&options()).await.unwrap();
    assert_eq!(first.pending_review, 1);

    let second = sweep.run(&options()).await.unwrap();
    assert_eq!(second.scanned, 1);
    assert_eq!(second.skipped_already_triggered, 1);
    assert_eq!(second.processed, 0);
    assert_eq!(classifier.calls(), 1);
    assert_eq!(test_db.count("billing_trigger_queue").await.unwrap(), 1);
}

#[tokio::test]
async fn dry_run_classifies_identically_without_writing() {
    let test_db = TestDb::new().await.unwrap();
    let billing = test_db.billing_project("Atlas", Some("CM-100")).await.unwrap();
    test_db.staffing_project("Atlas ops", Some("CM-100")).await.unwrap();
    for text in ["upon signing", "upon filing", "upon listing"] {
        test_db.text_milestone(billing.engagement_id, text).await.unwrap();
    }
    let reply = verdicts(&[(0, true, 0.97), (1, true, 0.81), (2, true, 0.5)]);
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![reply.clone(), reply]));
    let sweep = sweep_with(&test_db, classifier);

    let tables = [
        "billing_milestone",
        "billing_trigger_queue",
        "billing_action_item",
        "billing_staffing_project_link",
    ];
    let mut before = Vec::new();
    for table in tables {
        before.push(test_db.snapshot(table).await.unwrap());
    }

    let preview = sweep
        .run(&AiSweepOptions {
            dry_run: true,
            ..options()
        })
        .await
        .unwrap();
    for (table, rows) in tables.iter().zip(&before) {
        assert_eq!(&test_db.snapshot(table).await.unwrap(), rows, "{table} changed");
    }

    let real = sweep.run(&options()).await.unwrap();
    assert!(preview.dry_run);
    assert_eq!(preview.confirmed, real.confirmed);
    assert_eq!(preview.pending_review, real.pending_review);
    assert_eq!(preview.skipped_low_confidence, real.skipped_low_confidence);
    assert_eq!(preview.auto_linked, real.auto_linked);
    assert_eq!(
        (real.confirmed, real.pending_review, real.skipped_low_confidence),
        (1, 1, 1)
    );
}

#[tokio::test]
async fn overlapping_run_fails_fast_while_other_sweep_proceeds() {
    let test_db = TestDb::new().await.unwrap();
    single_candidate(&test_db).await;
    let locks = SweepLocks::new();
    let gated = Arc::new(GatedClassifier::new(verdicts(&[])));
    let classifier: Arc<dyn MilestoneClassifier> = gated.clone();
    let sweep = Arc::new(
        AiSweep::new(test_db.db(), Some(classifier)).with_locks(locks.clone()),
    );

    let running = Arc::clone(&sweep);
    let first = tokio::spawn(async move { running.run(&options()).await });
    gated.entered().await;
    assert!(locks.is_held(AI_SWEEP_LOCK));

    let err = sweep.run(&options()).await.unwrap_err();
    assert!(matches!(err, LexbillError::SweepLock { ref name } if name == AI_SWEEP_LOCK));

    // The date sweep uses its own lock name.
    let date_sweep = DateSweep::with_locks(test_db.db(), locks.clone());
    assert!(date_sweep.run(&DateSweepOptions::default()).await.is_ok());

    gated.release();
    assert!(first.await.unwrap().is_ok());
    assert!(!locks.is_held(AI_SWEEP_LOCK));

    gated.release();
    assert!(sweep.run(&options()).await.is_ok());
}
