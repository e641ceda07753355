//! Posting service: the single owner of the batch lifecycle
//!
//! Every status change on a posting batch runs through here. Commands load
//! the aggregate, validate, apply the pure transition, then write back with
//! a compare-and-swap; a stale version loses and the caller may retry.
//! Events go out after the write and never roll it back.

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{DomainEvent, EventPublisher};
use crate::traits::{AccountDirectory, BatchStore, PeriodCalendar};
use crate::types::*;
use crate::utils::validation::{validate_batch, validate_batch_number, validate_period};
use crate::workflow::{
    ApprovalEngine, ApprovalRequest, ApprovalStore, Decision, RequestStatus, WorkflowError,
};

/// Knobs governing how batches meet the approval engine
#[derive(Debug, Clone)]
pub struct PostingPolicy {
    /// Entity type used when resolving workflows
    pub entity_type: String,
    /// When no workflow matches at submit: `true` approves the batch on the
    /// spot, `false` fails the submit
    pub allow_self_approval: bool,
    /// Post reversal batches immediately once their approval clears
    pub auto_post_reversals: bool,
}

impl Default for PostingPolicy {
    fn default() -> Self {
        Self {
            entity_type: "PostingBatch".to_string(),
            allow_self_approval: true,
            auto_post_reversals: true,
        }
    }
}

/// Parameters for creating a batch
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub batch_number: String,
    pub batch_date: NaiveDate,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub branch_id: Option<Uuid>,
}

/// What a submit produced
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub batch: PostingBatch,
    /// Present when a workflow gates the batch; absent on self-approval
    pub request: Option<ApprovalRequest>,
    pub period_warning: Option<PeriodWarning>,
}

/// What an approve/reject produced
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub batch: PostingBatch,
    pub request: ApprovalRequest,
}

/// What a post produced
#[derive(Debug, Clone)]
pub struct PostOutcome {
    pub batch: PostingBatch,
    pub period_warning: Option<PeriodWarning>,
    /// The source batch flipped to Reversed, when the posted batch was a reversal
    pub reversed_source: Option<PostingBatch>,
}

/// What a reverse produced
#[derive(Debug, Clone)]
pub struct ReverseOutcome {
    pub original: PostingBatch,
    pub reversal: PostingBatch,
    /// Present when a workflow gates the reversal batch
    pub request: Option<ApprovalRequest>,
}

/// Orchestrates batches from draft through approval to posted or reversed.
///
/// Generic over storage plus the two read-side collaborators and the event
/// channel, so the same service runs against real backends in production
/// and in-memory ones in tests.
pub struct PostingService<S, D, C, E>
where
    S: BatchStore + ApprovalStore + Clone,
    D: AccountDirectory,
    C: PeriodCalendar,
    E: EventPublisher,
{
    store: S,
    directory: D,
    calendar: C,
    publisher: E,
    approvals: ApprovalEngine<S>,
    policy: PostingPolicy,
}

impl<S, D, C, E> PostingService<S, D, C, E>
where
    S: BatchStore + ApprovalStore + Clone,
    D: AccountDirectory,
    C: PeriodCalendar,
    E: EventPublisher,
{
    /// Create a posting service with the default policy
    pub fn new(store: S, directory: D, calendar: C, publisher: E) -> Self {
        Self {
            approvals: ApprovalEngine::new(store.clone()),
            store,
            directory,
            calendar,
            publisher,
            policy: PostingPolicy::default(),
        }
    }

    /// Create a posting service with an explicit policy
    pub fn with_policy(
        store: S,
        directory: D,
        calendar: C,
        publisher: E,
        policy: PostingPolicy,
    ) -> Self {
        Self {
            approvals: ApprovalEngine::new(store.clone()),
            store,
            directory,
            calendar,
            publisher,
            policy,
        }
    }

    /// The approval engine sharing this service's store; workflows are
    /// registered through it
    pub fn approvals(&self) -> &ApprovalEngine<S> {
        &self.approvals
    }

    /// Create a draft batch
    pub async fn create_batch(&self, params: NewBatch) -> PostingResult<PostingBatch> {
        validate_batch_number(&params.batch_number)?;
        if self
            .store
            .find_batch_by_number(&params.batch_number)
            .await?
            .is_some()
        {
            return Err(PostingError::DuplicateBatchNumber {
                batch_number: params.batch_number,
            });
        }

        let mut batch = PostingBatch::new(params.batch_number, params.batch_date);
        batch.description = params.description;
        batch.notes = params.notes;
        batch.branch_id = params.branch_id;
        if let Some(period) = self.calendar.resolve_period(params.batch_date).await? {
            batch.period_id = Some(period.period_id);
        }

        self.store.insert_batch(&batch).await?;
        debug!(batch_id = %batch.id, batch_number = %batch.batch_number, "batch created");
        Ok(batch)
    }

    /// Add a journal entry to a draft batch. The entry must pass shape
    /// validation and every line's account must exist and accept postings;
    /// a failing entry never becomes part of the batch.
    pub async fn add_entry(
        &self,
        batch_id: Uuid,
        entry: JournalEntry,
    ) -> PostingResult<PostingBatch> {
        let mut batch = self.must_get_batch(batch_id).await?;

        entry.validate()?;
        for line in &entry.lines {
            if !self.directory.account_exists(&line.account_id).await? {
                return Err(PostingError::AccountNotFound {
                    account_id: line.account_id.clone(),
                });
            }
            if !self.directory.allows_posting(&line.account_id).await? {
                return Err(PostingError::AccountNotPostable {
                    account_id: line.account_id.clone(),
                });
            }
        }

        let expected = batch.version;
        batch.add_entry(entry)?;
        batch.version += 1;
        self.store.update_batch(&batch, expected).await?;
        Ok(batch)
    }

    /// Remove a journal entry from a draft batch
    pub async fn remove_entry(
        &self,
        batch_id: Uuid,
        entry_id: Uuid,
    ) -> PostingResult<PostingBatch> {
        let mut batch = self.must_get_batch(batch_id).await?;
        let expected = batch.version;
        batch.remove_entry(entry_id)?;
        batch.version += 1;
        self.store.update_batch(&batch, expected).await?;
        Ok(batch)
    }

    /// Update a draft batch's description and notes
    pub async fn update_batch_details(
        &self,
        batch_id: Uuid,
        description: Option<String>,
        notes: Option<String>,
    ) -> PostingResult<PostingBatch> {
        let mut batch = self.must_get_batch(batch_id).await?;
        let expected = batch.version;
        batch.update_details(description, notes)?;
        batch.version += 1;
        self.store.update_batch(&batch, expected).await?;
        Ok(batch)
    }

    /// Submit a draft batch for approval.
    ///
    /// Runs balance and period validation, then resolves the governing
    /// workflow on the batch total and branch scope. A match opens an
    /// approval request and parks the batch in `PendingApproval`; no match
    /// either self-approves the batch or fails, per policy. Any failure
    /// leaves the batch untouched in `Draft`.
    pub async fn submit(&self, batch_id: Uuid, submitted_by: &str) -> PostingResult<SubmitOutcome> {
        let mut batch = self.must_get_batch(batch_id).await?;
        if batch.status != BatchStatus::Draft {
            return Err(PostingError::IllegalTransition {
                batch_id: batch.id,
                from: batch.status.clone(),
                action: "submit",
            });
        }

        validate_batch(&batch)?;
        let period = self.calendar.resolve_period(batch.batch_date).await?;
        let period_warning = validate_period(&batch, period.as_ref())?;
        if let Some(warning) = &period_warning {
            warn!(batch_id = %batch.id, period_id = %warning.period_id, "{}", warning.message);
        }
        if let Some(period) = &period {
            batch.period_id = Some(period.period_id);
        }

        let amount = batch.total_debit();
        let expected = batch.version;

        match self
            .approvals
            .resolve(&self.policy.entity_type, Some(&amount), batch.branch_id)
            .await
        {
            Ok(workflow) => {
                let request = self
                    .approvals
                    .open_request(&workflow, batch.id, submitted_by, Some(amount.clone()))
                    .await?;
                batch.begin_approval(request.id)?;
                batch.version += 1;
                self.store.update_batch(&batch, expected).await?;

                info!(
                    batch_id = %batch.id,
                    batch_number = %batch.batch_number,
                    workflow = %workflow.code,
                    request_id = %request.id,
                    "batch submitted for approval"
                );
                self.emit(DomainEvent::BatchSubmitted {
                    batch_id: batch.id,
                    batch_number: batch.batch_number.clone(),
                    total_debit: amount,
                    total_credit: batch.total_credit(),
                    approval_request_id: Some(request.id),
                })
                .await;

                Ok(SubmitOutcome {
                    batch,
                    request: Some(request),
                    period_warning,
                })
            }
            Err(WorkflowError::NoMatchingWorkflow { .. }) if self.policy.allow_self_approval => {
                batch.self_approve(submitted_by)?;
                batch.version += 1;
                self.store.update_batch(&batch, expected).await?;

                info!(
                    batch_id = %batch.id,
                    batch_number = %batch.batch_number,
                    submitted_by,
                    "no workflow matched; batch self-approved"
                );
                self.emit(DomainEvent::BatchSubmitted {
                    batch_id: batch.id,
                    batch_number: batch.batch_number.clone(),
                    total_debit: amount,
                    total_credit: batch.total_credit(),
                    approval_request_id: None,
                })
                .await;
                self.emit(DomainEvent::BatchApproved {
                    batch_id: batch.id,
                    batch_number: batch.batch_number.clone(),
                    approved_by: submitted_by.to_string(),
                })
                .await;

                Ok(SubmitOutcome {
                    batch,
                    request: None,
                    period_warning,
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Record one approver's sign-off at the batch's current approval level.
    /// Clearing the final level approves the batch itself.
    pub async fn approve_level(
        &self,
        batch_id: Uuid,
        approver_id: &str,
        comments: Option<String>,
    ) -> PostingResult<DecisionOutcome> {
        let batch = self.must_get_batch(batch_id).await?;
        let request_id = self.open_request_id(&batch)?;
        let request = self.approvals.approve(request_id, approver_id, comments).await?;

        let decided_level = request.decisions.last().map(|d| d.level).unwrap_or(0);
        self.emit(DomainEvent::ApprovalLevelDecided {
            request_id: request.id,
            entity_id: batch.id,
            level: decided_level,
            decision: Decision::Approved,
            approver_id: approver_id.to_string(),
        })
        .await;

        if request.status == RequestStatus::Approved {
            return self.finish_approval(batch, request, approver_id).await;
        }
        Ok(DecisionOutcome { batch, request })
    }

    /// Record a rejection; ends the approval and parks the batch in
    /// `Rejected`. A rejected reversal unlocks its source batch again.
    pub async fn reject_level(
        &self,
        batch_id: Uuid,
        approver_id: &str,
        comments: Option<String>,
    ) -> PostingResult<DecisionOutcome> {
        let mut batch = self.must_get_batch(batch_id).await?;
        let request_id = self.open_request_id(&batch)?;
        let request = self.approvals.reject(request_id, approver_id, comments).await?;

        let decided_level = request.decisions.last().map(|d| d.level).unwrap_or(0);
        self.emit(DomainEvent::ApprovalLevelDecided {
            request_id: request.id,
            entity_id: batch.id,
            level: decided_level,
            decision: Decision::Rejected,
            approver_id: approver_id.to_string(),
        })
        .await;

        let expected = batch.version;
        batch.apply_rejection()?;
        batch.version += 1;
        self.store.update_batch(&batch, expected).await?;

        info!(
            batch_id = %batch.id,
            batch_number = %batch.batch_number,
            rejected_by = approver_id,
            "batch rejected"
        );
        self.emit(DomainEvent::BatchRejected {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            rejected_by: approver_id.to_string(),
        })
        .await;

        if let Some(source_id) = batch.reversal_of {
            self.unlink_rejected_reversal(source_id, batch.id).await?;
        }

        Ok(DecisionOutcome { batch, request })
    }

    /// Withdraw a pending approval and hand the batch back for correction
    pub async fn cancel_approval(
        &self,
        batch_id: Uuid,
        reason: &str,
    ) -> PostingResult<PostingBatch> {
        let mut batch = self.must_get_batch(batch_id).await?;
        let request_id = self.open_request_id(&batch)?;
        self.approvals.cancel(request_id, reason).await?;

        let expected = batch.version;
        batch.revert_to_draft()?;
        batch.version += 1;
        self.store.update_batch(&batch, expected).await?;

        info!(
            batch_id = %batch.id,
            batch_number = %batch.batch_number,
            reason,
            "approval cancelled; batch back in draft"
        );
        Ok(batch)
    }

    /// Post an approved batch to the ledger.
    ///
    /// Balance and period validation run again here: the period may have
    /// closed while the batch sat in approval. Posting a reversal batch
    /// also flips its source batch to `Reversed`.
    pub async fn post(&self, batch_id: Uuid, posted_by: &str) -> PostingResult<PostOutcome> {
        let mut batch = self.must_get_batch(batch_id).await?;
        if batch.status != BatchStatus::Approved {
            return Err(PostingError::NotApproved {
                batch_id: batch.id,
                status: batch.status.clone(),
            });
        }

        validate_batch(&batch)?;
        let period = self.calendar.resolve_period(batch.batch_date).await?;
        let period_warning = validate_period(&batch, period.as_ref())?;
        if let Some(warning) = &period_warning {
            warn!(batch_id = %batch.id, period_id = %warning.period_id, "{}", warning.message);
        }

        let expected = batch.version;
        batch.mark_posted(posted_by)?;
        batch.version += 1;
        self.store.update_batch(&batch, expected).await?;

        info!(
            batch_id = %batch.id,
            batch_number = %batch.batch_number,
            posted_by,
            total = %batch.total_debit(),
            "batch posted"
        );
        self.emit(DomainEvent::BatchPosted {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            posted_by: posted_by.to_string(),
            total_debit: batch.total_debit(),
        })
        .await;

        let mut reversed_source = None;
        if let Some(source_id) = batch.reversal_of {
            reversed_source = Some(self.flip_reversed_source(source_id, &batch).await?);
        }

        Ok(PostOutcome {
            batch,
            period_warning,
            reversed_source,
        })
    }

    /// Reverse a posted batch: synthesize the mirror batch and run it
    /// through the normal submit pipeline.
    ///
    /// The source is linked to its reversal before anything else moves, so
    /// a second reverse fails with `AlreadyReversed` even while the mirror
    /// is still pending approval. When the mirror self-approves, it posts
    /// inside this call and the source comes back already `Reversed`.
    pub async fn reverse(
        &self,
        batch_id: Uuid,
        reversal_date: NaiveDate,
        reason: &str,
        actor: &str,
    ) -> PostingResult<ReverseOutcome> {
        let mut original = self.must_get_batch(batch_id).await?;
        let reversal_number = self.next_reversal_number(&original.batch_number).await?;
        let reversal = original.build_reversal(reversal_number, reversal_date, reason)?;

        // Pre-flight the mirror before anything persists: a closed period
        // or a policy refusal must leave the source untouched.
        validate_batch(&reversal)?;
        let period = self.calendar.resolve_period(reversal_date).await?;
        validate_period(&reversal, period.as_ref())?;
        match self
            .approvals
            .resolve(
                &self.policy.entity_type,
                Some(&reversal.total_debit()),
                reversal.branch_id,
            )
            .await
        {
            Ok(_) => {}
            Err(WorkflowError::NoMatchingWorkflow { .. }) if self.policy.allow_self_approval => {}
            Err(error) => return Err(error.into()),
        }

        let expected = original.version;
        original.link_reversal(reversal.id, reason)?;
        original.version += 1;
        self.store.insert_batch(&reversal).await?;
        self.store.update_batch(&original, expected).await?;

        info!(
            batch_id = %original.id,
            batch_number = %original.batch_number,
            reversal_id = %reversal.id,
            reversal_number = %reversal.batch_number,
            reason,
            "reversal batch created"
        );

        let submitted = self.submit(reversal.id, actor).await?;
        let mut reversal = submitted.batch;
        let request = submitted.request;

        if reversal.status == BatchStatus::Approved && self.policy.auto_post_reversals {
            let posted = self.post(reversal.id, actor).await?;
            reversal = posted.batch;
            if let Some(source) = posted.reversed_source {
                original = source;
            }
        } else {
            original = self.must_get_batch(original.id).await?;
        }

        Ok(ReverseOutcome {
            original,
            reversal,
            request,
        })
    }

    /// Get a batch by id
    pub async fn get_batch(&self, batch_id: Uuid) -> PostingResult<PostingBatch> {
        self.must_get_batch(batch_id).await
    }

    /// Look a batch up by its human-assigned number
    pub async fn find_batch_by_number(
        &self,
        batch_number: &str,
    ) -> PostingResult<Option<PostingBatch>> {
        self.store.find_batch_by_number(batch_number).await
    }

    /// Get the approval request gating a batch
    pub async fn get_request(&self, request_id: Uuid) -> PostingResult<ApprovalRequest> {
        Ok(self.approvals.get_request(request_id).await?)
    }

    async fn must_get_batch(&self, batch_id: Uuid) -> PostingResult<PostingBatch> {
        self.store
            .get_batch(batch_id)
            .await?
            .ok_or(PostingError::BatchNotFound { batch_id })
    }

    fn open_request_id(&self, batch: &PostingBatch) -> PostingResult<Uuid> {
        batch.approval_request_id.ok_or_else(|| {
            PostingError::Validation(format!(
                "batch {} has no open approval request",
                batch.batch_number
            ))
        })
    }

    async fn finish_approval(
        &self,
        mut batch: PostingBatch,
        request: ApprovalRequest,
        approved_by: &str,
    ) -> PostingResult<DecisionOutcome> {
        let expected = batch.version;
        batch.apply_approval(approved_by)?;
        batch.version += 1;
        self.store.update_batch(&batch, expected).await?;

        info!(
            batch_id = %batch.id,
            batch_number = %batch.batch_number,
            approved_by,
            "batch approved"
        );
        self.emit(DomainEvent::BatchApproved {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            approved_by: approved_by.to_string(),
        })
        .await;

        if batch.is_reversal() && self.policy.auto_post_reversals {
            let posted = self.post(batch.id, approved_by).await?;
            return Ok(DecisionOutcome {
                batch: posted.batch,
                request,
            });
        }
        Ok(DecisionOutcome { batch, request })
    }

    async fn flip_reversed_source(
        &self,
        source_id: Uuid,
        reversal: &PostingBatch,
    ) -> PostingResult<PostingBatch> {
        let mut source = self.must_get_batch(source_id).await?;
        let expected = source.version;
        source.mark_reversed()?;
        source.version += 1;
        self.store.update_batch(&source, expected).await?;

        info!(
            batch_id = %source.id,
            batch_number = %source.batch_number,
            reversal_id = %reversal.id,
            "source batch reversed"
        );
        self.emit(DomainEvent::BatchReversed {
            batch_id: source.id,
            batch_number: source.batch_number.clone(),
            reversal_batch_id: reversal.id,
            reason: source.reversal_reason.clone().unwrap_or_default(),
        })
        .await;
        Ok(source)
    }

    async fn unlink_rejected_reversal(
        &self,
        source_id: Uuid,
        reversal_id: Uuid,
    ) -> PostingResult<()> {
        let mut source = self.must_get_batch(source_id).await?;
        if source.reversed_by != Some(reversal_id) {
            return Ok(());
        }
        let expected = source.version;
        source.clear_reversal_link();
        source.version += 1;
        self.store.update_batch(&source, expected).await?;
        info!(
            batch_id = %source.id,
            reversal_id = %reversal_id,
            "rejected reversal unlinked; source can be reversed again"
        );
        Ok(())
    }

    async fn next_reversal_number(&self, original_number: &str) -> PostingResult<String> {
        let mut candidate = format!("REV-{original_number}");
        let mut attempt = 1;
        while self
            .store
            .find_batch_by_number(&candidate)
            .await?
            .is_some()
        {
            attempt += 1;
            if attempt > 9 {
                return Err(PostingError::DuplicateBatchNumber {
                    batch_number: candidate,
                });
            }
            candidate = format!("REV{attempt}-{original_number}");
        }
        Ok(candidate)
    }

    async fn emit(&self, event: DomainEvent) {
        if let Err(error) = self.publisher.publish(&event).await {
            warn!(event = event.name(), %error, "event publish failed");
        }
    }
}
