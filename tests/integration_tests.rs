//! Integration tests for posting-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use posting_core::{
    patterns,
    utils::{MemoryAccountDirectory, MemoryPeriodCalendar, MemoryPublisher, MemoryStorage},
    ApprovalStore, ApprovalWorkflow, BatchStatus, BatchStore, EntryBuilder, NewBatch,
    PeriodStatus, PostingError, PostingPolicy, PostingService, RequestStatus, WorkflowError,
};

type Service =
    PostingService<MemoryStorage, MemoryAccountDirectory, MemoryPeriodCalendar, MemoryPublisher>;

struct Harness {
    service: Service,
    store: MemoryStorage,
    calendar: MemoryPeriodCalendar,
    publisher: MemoryPublisher,
}

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn harness_with_policy(policy: PostingPolicy) -> Harness {
    let directory = MemoryAccountDirectory::new();
    directory.add_account("1000", posting_core::AccountType::Asset, true);
    directory.add_account("1200", posting_core::AccountType::Asset, true);
    directory.add_account("4000", posting_core::AccountType::Income, true);
    directory.add_account("6100", posting_core::AccountType::Expense, true);

    let calendar = MemoryPeriodCalendar::new();
    calendar.add_period(march(1), march(31), PeriodStatus::Open);

    let store = MemoryStorage::new();
    let publisher = MemoryPublisher::new();
    let service = PostingService::with_policy(
        store.clone(),
        directory,
        calendar.clone(),
        publisher.clone(),
        policy,
    );
    Harness {
        service,
        store,
        calendar,
        publisher,
    }
}

fn harness() -> Harness {
    harness_with_policy(PostingPolicy::default())
}

fn draft_batch(number: &str) -> NewBatch {
    NewBatch {
        batch_number: number.to_string(),
        batch_date: march(15),
        description: Some("March close".to_string()),
        notes: None,
        branch_id: None,
    }
}

fn expense_entry(amount: i64) -> posting_core::JournalEntry {
    patterns::expense_payment(
        march(15),
        "DOC-1".to_string(),
        "Office supplies".to_string(),
        "6100".to_string(),
        "1000".to_string(),
        BigDecimal::from(amount),
    )
    .unwrap()
}

async fn register_two_level_workflow(service: &Service) {
    let workflow = ApprovalWorkflow::new("JRNL-2L", "Two-level journals", "PostingBatch", 2)
        .unwrap()
        .with_level_name(1, "Supervisor")
        .with_level_name(2, "Controller");
    service.approvals().register_workflow(workflow).await.unwrap();
}

#[tokio::test]
async fn test_full_lifecycle_through_two_level_workflow() {
    let h = harness();
    register_two_level_workflow(&h.service).await;

    let batch = h.service.create_batch(draft_batch("JB-2024-001")).await.unwrap();
    h.service.add_entry(batch.id, expense_entry(100)).await.unwrap();

    // balanced entry: totals agree at entry and batch level
    let batch = h.service.get_batch(batch.id).await.unwrap();
    assert_eq!(batch.total_debit(), BigDecimal::from(100));
    assert_eq!(batch.total_credit(), BigDecimal::from(100));

    let submitted = h.service.submit(batch.id, "clerk").await.unwrap();
    assert_eq!(submitted.batch.status, BatchStatus::PendingApproval);
    let request = submitted.request.unwrap();
    assert_eq!(request.current_level, 1);

    // level 1 approves: level advances, request stays pending
    let first = h.service.approve_level(batch.id, "supervisor", None).await.unwrap();
    assert_eq!(first.request.current_level, 2);
    assert_eq!(first.request.status, RequestStatus::Pending);
    assert_eq!(first.batch.status, BatchStatus::PendingApproval);

    // level 2 approves: request terminal, batch approved with stamps
    let second = h.service.approve_level(batch.id, "controller", None).await.unwrap();
    assert_eq!(second.request.status, RequestStatus::Approved);
    assert_eq!(second.batch.status, BatchStatus::Approved);
    assert_eq!(second.batch.approved_by.as_deref(), Some("controller"));
    assert!(second.batch.approved_at.is_some());

    let posted = h.service.post(batch.id, "controller").await.unwrap();
    assert_eq!(posted.batch.status, BatchStatus::Posted);
    assert_eq!(posted.batch.posted_by.as_deref(), Some("controller"));
    assert!(posted.batch.entries.iter().all(|e| e.is_posted));

    let names: Vec<&str> = h.publisher.published().iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec![
            "batch.submitted",
            "approval.level_decided",
            "approval.level_decided",
            "batch.approved",
            "batch.posted",
        ]
    );
}

#[tokio::test]
async fn test_unbalanced_entry_never_reaches_batch() {
    let h = harness();
    let batch = h.service.create_batch(draft_batch("JB-2024-002")).await.unwrap();

    // builder refuses the unbalanced shape outright
    let built = EntryBuilder::new(march(15), "DOC-2".to_string(), "Skewed".to_string())
        .debit("6100".to_string(), BigDecimal::from(100), None)
        .credit("1000".to_string(), BigDecimal::from(60), None)
        .build();
    assert!(matches!(built, Err(PostingError::UnbalancedEntry { .. })));

    // a hand-assembled unbalanced entry is refused by the service as well
    let mut entry = posting_core::JournalEntry::new(
        march(15),
        "DOC-2".to_string(),
        "Skewed".to_string(),
    );
    entry
        .add_line(
            posting_core::JournalLine::debit("6100".to_string(), BigDecimal::from(100), None)
                .unwrap(),
        )
        .unwrap();
    entry
        .add_line(
            posting_core::JournalLine::credit("1000".to_string(), BigDecimal::from(60), None)
                .unwrap(),
        )
        .unwrap();
    let result = h.service.add_entry(batch.id, entry).await;
    assert!(matches!(result, Err(PostingError::UnbalancedEntry { .. })));

    let batch = h.service.get_batch(batch.id).await.unwrap();
    assert!(batch.entries.is_empty());
}

#[tokio::test]
async fn test_submit_into_closed_period_leaves_draft() {
    let h = harness();
    h.calendar.add_period(
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        PeriodStatus::Closed,
    );

    let batch = h
        .service
        .create_batch(NewBatch {
            batch_number: "JB-FEB-001".to_string(),
            batch_date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            description: None,
            notes: None,
            branch_id: None,
        })
        .await
        .unwrap();
    let entry = patterns::expense_payment(
        NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
        "DOC-3".to_string(),
        "Late invoice".to_string(),
        "6100".to_string(),
        "1000".to_string(),
        BigDecimal::from(75),
    )
    .unwrap();
    h.service.add_entry(batch.id, entry).await.unwrap();

    let result = h.service.submit(batch.id, "clerk").await;
    assert!(matches!(result, Err(PostingError::PeriodClosed { .. })));

    let batch = h.service.get_batch(batch.id).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Draft);
    assert!(batch.approval_request_id.is_none());
}

#[tokio::test]
async fn test_post_from_pending_approval_fails() {
    let h = harness();
    register_two_level_workflow(&h.service).await;

    let batch = h.service.create_batch(draft_batch("JB-2024-003")).await.unwrap();
    h.service.add_entry(batch.id, expense_entry(200)).await.unwrap();
    h.service.submit(batch.id, "clerk").await.unwrap();

    let result = h.service.post(batch.id, "controller").await;
    assert!(matches!(
        result,
        Err(PostingError::NotApproved {
            status: BatchStatus::PendingApproval,
            ..
        })
    ));
}

#[tokio::test]
async fn test_rejection_is_absorbing() {
    let h = harness();
    register_two_level_workflow(&h.service).await;

    let batch = h.service.create_batch(draft_batch("JB-2024-004")).await.unwrap();
    h.service.add_entry(batch.id, expense_entry(300)).await.unwrap();
    h.service.submit(batch.id, "clerk").await.unwrap();

    let rejected = h
        .service
        .reject_level(batch.id, "supervisor", Some("wrong cost centre".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.batch.status, BatchStatus::Rejected);
    assert_eq!(rejected.request.status, RequestStatus::Rejected);

    // nothing moves a rejected request or batch
    let late_approval = h.service.approve_level(batch.id, "controller", None).await;
    assert!(matches!(
        late_approval,
        Err(PostingError::Workflow(WorkflowError::AlreadyDecided { .. }))
    ));
    let batch = h.service.get_batch(batch.id).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Rejected);

    let resubmit = h.service.submit(batch.id, "clerk").await;
    assert!(matches!(
        resubmit,
        Err(PostingError::IllegalTransition { .. })
    ));
}

#[tokio::test]
async fn test_reverse_mirrors_lines_and_flips_original() {
    let h = harness();

    let batch = h.service.create_batch(draft_batch("JB-2024-005")).await.unwrap();
    let entry = EntryBuilder::new(march(15), "DOC-5".to_string(), "Cash sale".to_string())
        .debit("1000".to_string(), BigDecimal::from(50), None)
        .credit("4000".to_string(), BigDecimal::from(50), None)
        .build()
        .unwrap();
    h.service.add_entry(batch.id, entry).await.unwrap();
    h.service.submit(batch.id, "clerk").await.unwrap();
    h.service.post(batch.id, "controller").await.unwrap();

    let outcome = h
        .service
        .reverse(batch.id, march(20), "posted against wrong month", "controller")
        .await
        .unwrap();

    // no workflow registered, so the whole cascade ran inline
    assert_eq!(outcome.original.status, BatchStatus::Reversed);
    assert_eq!(outcome.reversal.status, BatchStatus::Posted);
    assert_eq!(outcome.reversal.reversal_of, Some(batch.id));
    assert_eq!(outcome.original.reversed_by, Some(outcome.reversal.id));
    assert_eq!(outcome.reversal.batch_number, "REV-JB-2024-005");

    // every line swapped sides, totals preserved
    let original_lines = &outcome.original.entries[0].lines;
    let mirror_lines = &outcome.reversal.entries[0].lines;
    assert_eq!(original_lines.len(), mirror_lines.len());
    for (original, mirror) in original_lines.iter().zip(mirror_lines) {
        assert_eq!(original.account_id, mirror.account_id);
        assert_eq!(original.debit, mirror.credit);
        assert_eq!(original.credit, mirror.debit);
    }
    assert_eq!(
        outcome.original.total_debit(),
        outcome.reversal.total_debit()
    );

    // a second reverse is refused
    let again = h
        .service
        .reverse(batch.id, march(21), "twice", "controller")
        .await;
    assert!(matches!(again, Err(PostingError::IllegalTransition { .. })));
}

#[tokio::test]
async fn test_reverse_twice_while_mirror_pending() {
    let h = harness();
    register_two_level_workflow(&h.service).await;

    let batch = h.service.create_batch(draft_batch("JB-2024-006")).await.unwrap();
    h.service.add_entry(batch.id, expense_entry(400)).await.unwrap();
    h.service.submit(batch.id, "clerk").await.unwrap();
    h.service.approve_level(batch.id, "supervisor", None).await.unwrap();
    h.service.approve_level(batch.id, "controller", None).await.unwrap();
    h.service.post(batch.id, "controller").await.unwrap();

    // the workflow gates the mirror too: it parks in PendingApproval
    let outcome = h
        .service
        .reverse(batch.id, march(22), "duplicate posting", "clerk")
        .await
        .unwrap();
    assert_eq!(outcome.reversal.status, BatchStatus::PendingApproval);
    assert_eq!(outcome.original.status, BatchStatus::Posted);
    assert_eq!(outcome.original.reversed_by, Some(outcome.reversal.id));

    // the original is already claimed by the pending mirror
    let second = h
        .service
        .reverse(batch.id, march(22), "again", "clerk")
        .await;
    assert!(matches!(second, Err(PostingError::AlreadyReversed { .. })));

    // approving the mirror posts it and flips the original, in one call
    h.service
        .approve_level(outcome.reversal.id, "supervisor", None)
        .await
        .unwrap();
    let decided = h
        .service
        .approve_level(outcome.reversal.id, "controller", None)
        .await
        .unwrap();
    assert_eq!(decided.batch.status, BatchStatus::Posted);

    let original = h.service.get_batch(batch.id).await.unwrap();
    assert_eq!(original.status, BatchStatus::Reversed);
}

#[tokio::test]
async fn test_rejected_reversal_unlocks_original() {
    let h = harness();
    register_two_level_workflow(&h.service).await;

    let batch = h.service.create_batch(draft_batch("JB-2024-007")).await.unwrap();
    h.service.add_entry(batch.id, expense_entry(500)).await.unwrap();
    h.service.submit(batch.id, "clerk").await.unwrap();
    h.service.approve_level(batch.id, "supervisor", None).await.unwrap();
    h.service.approve_level(batch.id, "controller", None).await.unwrap();
    h.service.post(batch.id, "controller").await.unwrap();

    let outcome = h
        .service
        .reverse(batch.id, march(23), "suspected duplicate", "clerk")
        .await
        .unwrap();
    h.service
        .reject_level(outcome.reversal.id, "supervisor", Some("not a duplicate".to_string()))
        .await
        .unwrap();

    // the rejected mirror released its claim; the original can be reversed again
    let original = h.service.get_batch(batch.id).await.unwrap();
    assert_eq!(original.status, BatchStatus::Posted);
    assert!(original.reversed_by.is_none());

    let retry = h
        .service
        .reverse(batch.id, march(24), "actually wrong amount", "clerk")
        .await
        .unwrap();
    assert_eq!(retry.reversal.batch_number, "REV2-JB-2024-007");
}

#[tokio::test]
async fn test_no_matching_workflow_policy() {
    // strict policy: submit fails, batch stays draft
    let strict = harness_with_policy(PostingPolicy {
        allow_self_approval: false,
        ..PostingPolicy::default()
    });
    let batch = strict.service.create_batch(draft_batch("JB-2024-008")).await.unwrap();
    strict.service.add_entry(batch.id, expense_entry(60)).await.unwrap();

    let result = strict.service.submit(batch.id, "clerk").await;
    assert!(matches!(
        result,
        Err(PostingError::Workflow(WorkflowError::NoMatchingWorkflow { .. }))
    ));
    let batch = strict.service.get_batch(batch.id).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Draft);

    // default policy: the batch self-approves and can post straight away
    let lenient = harness();
    let batch = lenient.service.create_batch(draft_batch("JB-2024-009")).await.unwrap();
    lenient.service.add_entry(batch.id, expense_entry(60)).await.unwrap();

    let submitted = lenient.service.submit(batch.id, "clerk").await.unwrap();
    assert_eq!(submitted.batch.status, BatchStatus::Approved);
    assert_eq!(submitted.batch.approved_by.as_deref(), Some("clerk"));
    assert!(submitted.request.is_none());
}

#[tokio::test]
async fn test_parallel_level_requires_quorum() {
    let h = harness();
    let workflow = ApprovalWorkflow::new("DUAL", "Dual control", "PostingBatch", 1)
        .unwrap()
        .parallel(vec![2]);
    h.service.approvals().register_workflow(workflow).await.unwrap();

    let batch = h.service.create_batch(draft_batch("JB-2024-010")).await.unwrap();
    h.service.add_entry(batch.id, expense_entry(80)).await.unwrap();
    h.service.submit(batch.id, "clerk").await.unwrap();

    let first = h.service.approve_level(batch.id, "alice", None).await.unwrap();
    assert_eq!(first.request.status, RequestStatus::Pending);
    assert_eq!(first.request.current_level, 1);
    assert_eq!(first.batch.status, BatchStatus::PendingApproval);

    let duplicate = h.service.approve_level(batch.id, "alice", None).await;
    assert!(matches!(
        duplicate,
        Err(PostingError::Workflow(WorkflowError::DuplicateApprover { .. }))
    ));

    let second = h.service.approve_level(batch.id, "bob", None).await.unwrap();
    assert_eq!(second.request.status, RequestStatus::Approved);
    assert_eq!(second.batch.status, BatchStatus::Approved);
}

#[tokio::test]
async fn test_stale_version_write_is_refused() {
    let h = harness();
    let batch = h.service.create_batch(draft_batch("JB-2024-011")).await.unwrap();
    let stale = batch.clone();

    h.service.add_entry(batch.id, expense_entry(90)).await.unwrap();

    // a writer still holding the pre-update version loses
    let result = h.store.update_batch(&stale, stale.version).await;
    assert!(matches!(
        result,
        Err(PostingError::ConcurrentModification { .. })
    ));
}

#[tokio::test]
async fn test_racing_approvers_cannot_both_win_a_level() {
    let h = harness();
    let workflow = ApprovalWorkflow::new("SOLO", "Single approver", "PostingBatch", 1).unwrap();
    h.service.approvals().register_workflow(workflow).await.unwrap();

    let batch = h.service.create_batch(draft_batch("JB-2024-012")).await.unwrap();
    h.service.add_entry(batch.id, expense_entry(70)).await.unwrap();
    let submitted = h.service.submit(batch.id, "clerk").await.unwrap();
    let request_id = submitted.request.unwrap().id;

    // both approvers read the same request state; the engine's CAS means
    // only the first write lands, the loser surfaces a typed error
    let loser_copy = h.store.get_request(request_id).await.unwrap().unwrap();

    h.service.approve_level(batch.id, "alice", None).await.unwrap();

    let result = h.store.update_request(&loser_copy, loser_copy.version).await;
    assert!(matches!(
        result,
        Err(WorkflowError::ConcurrentModification { .. })
    ));
}

#[tokio::test]
async fn test_adjustment_period_warns_on_non_adjusting_entries() {
    let h = harness();
    h.calendar.add_period(
        NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        PeriodStatus::Adjustment,
    );
    let year_end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

    let batch = h
        .service
        .create_batch(NewBatch {
            batch_number: "JB-YE-001".to_string(),
            batch_date: year_end,
            description: None,
            notes: None,
            branch_id: None,
        })
        .await
        .unwrap();
    let ordinary = patterns::expense_payment(
        year_end,
        "DOC-YE".to_string(),
        "December courier".to_string(),
        "6100".to_string(),
        "1000".to_string(),
        BigDecimal::from(40),
    )
    .unwrap();
    h.service.add_entry(batch.id, ordinary).await.unwrap();

    let submitted = h.service.submit(batch.id, "clerk").await.unwrap();
    assert!(submitted.period_warning.is_some());
    assert_eq!(submitted.batch.status, BatchStatus::Approved);

    // adjusting-only batches pass clean
    let batch2 = h
        .service
        .create_batch(NewBatch {
            batch_number: "JB-YE-002".to_string(),
            batch_date: year_end,
            description: None,
            notes: None,
            branch_id: None,
        })
        .await
        .unwrap();
    let accrual = patterns::year_end_accrual(
        year_end,
        "ACC-9".to_string(),
        "Accrued audit fees".to_string(),
        "6100".to_string(),
        "1000".to_string(),
        BigDecimal::from(5_000),
    )
    .unwrap();
    h.service.add_entry(batch2.id, accrual).await.unwrap();

    let submitted = h.service.submit(batch2.id, "clerk").await.unwrap();
    assert!(submitted.period_warning.is_none());
}

#[tokio::test]
async fn test_period_closing_between_approval_and_post() {
    let h = harness();
    let period_id = h.calendar.add_period(
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
        PeriodStatus::Open,
    );

    let batch = h
        .service
        .create_batch(NewBatch {
            batch_number: "JB-APR-001".to_string(),
            batch_date: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
            description: None,
            notes: None,
            branch_id: None,
        })
        .await
        .unwrap();
    let entry = patterns::expense_payment(
        NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
        "DOC-APR".to_string(),
        "April rent".to_string(),
        "6100".to_string(),
        "1000".to_string(),
        BigDecimal::from(900),
    )
    .unwrap();
    h.service.add_entry(batch.id, entry).await.unwrap();
    let submitted = h.service.submit(batch.id, "clerk").await.unwrap();
    assert_eq!(submitted.batch.status, BatchStatus::Approved);

    // month-end closes the period while the batch waits to post
    h.calendar.set_status(period_id, PeriodStatus::Closed);

    let result = h.service.post(batch.id, "controller").await;
    assert!(matches!(result, Err(PostingError::PeriodClosed { .. })));
    let batch = h.service.get_batch(batch.id).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Approved);
}

#[tokio::test]
async fn test_cancel_approval_returns_batch_to_draft() {
    let h = harness();
    register_two_level_workflow(&h.service).await;

    let batch = h.service.create_batch(draft_batch("JB-2024-013")).await.unwrap();
    h.service.add_entry(batch.id, expense_entry(120)).await.unwrap();
    let submitted = h.service.submit(batch.id, "clerk").await.unwrap();
    let request_id = submitted.request.unwrap().id;

    let batch = h
        .service
        .cancel_approval(batch.id, "entered against the wrong branch")
        .await
        .unwrap();
    assert_eq!(batch.status, BatchStatus::Draft);
    assert!(batch.approval_request_id.is_none());

    let request = h.service.get_request(request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Cancelled);

    // draft again: entries can change and the batch can be resubmitted
    h.service.add_entry(batch.id, expense_entry(10)).await.unwrap();
    let resubmitted = h.service.submit(batch.id, "clerk").await.unwrap();
    assert_eq!(resubmitted.batch.status, BatchStatus::PendingApproval);
}

#[tokio::test]
async fn test_publisher_failure_never_blocks_transitions() {
    let h = harness();
    h.publisher.set_failing(true);

    let batch = h.service.create_batch(draft_batch("JB-2024-014")).await.unwrap();
    h.service.add_entry(batch.id, expense_entry(30)).await.unwrap();
    h.service.submit(batch.id, "clerk").await.unwrap();
    let posted = h.service.post(batch.id, "controller").await.unwrap();

    assert_eq!(posted.batch.status, BatchStatus::Posted);
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn test_branch_scoped_workflow_resolution() {
    let h = harness();
    let branch = uuid::Uuid::new_v4();

    let branch_wf = ApprovalWorkflow::new("BR-1", "Branch one journals", "PostingBatch", 1)
        .unwrap()
        .for_branch(branch)
        .with_priority(500);
    let general = ApprovalWorkflow::new("GEN", "General journals", "PostingBatch", 2).unwrap();
    h.service.approvals().register_workflow(branch_wf).await.unwrap();
    h.service.approvals().register_workflow(general).await.unwrap();

    let batch = h
        .service
        .create_batch(NewBatch {
            branch_id: Some(branch),
            ..draft_batch("JB-2024-015")
        })
        .await
        .unwrap();
    h.service.add_entry(batch.id, expense_entry(45)).await.unwrap();

    let submitted = h.service.submit(batch.id, "clerk").await.unwrap();
    let request = submitted.request.unwrap();
    assert_eq!(request.total_levels, 1);

    // unscoped batches fall through to the general workflow
    let other = h.service.create_batch(draft_batch("JB-2024-016")).await.unwrap();
    h.service.add_entry(other.id, expense_entry(45)).await.unwrap();
    let submitted = h.service.submit(other.id, "clerk").await.unwrap();
    assert_eq!(submitted.request.unwrap().total_levels, 2);
}
