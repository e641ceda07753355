//! Workflow resolution and decision processing over a pluggable store

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use tracing::info;
use uuid::Uuid;

use super::{ApprovalRequest, ApprovalWorkflow, WorkflowError, WorkflowResult};

/// Storage abstraction for workflow definitions and running requests.
///
/// `update_request` is a compare-and-swap: callers pass the version they
/// loaded, implementations must refuse the write when the stored version
/// differs and persist the request exactly as given otherwise.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn insert_workflow(&self, workflow: &ApprovalWorkflow) -> WorkflowResult<()>;
    async fn get_workflow(&self, workflow_id: Uuid) -> WorkflowResult<Option<ApprovalWorkflow>>;
    async fn list_workflows(&self, entity_type: &str) -> WorkflowResult<Vec<ApprovalWorkflow>>;
    async fn insert_request(&self, request: &ApprovalRequest) -> WorkflowResult<()>;
    async fn get_request(&self, request_id: Uuid) -> WorkflowResult<Option<ApprovalRequest>>;
    async fn update_request(
        &self,
        request: &ApprovalRequest,
        expected_version: u64,
    ) -> WorkflowResult<()>;
}

/// Approval engine: resolves which workflow governs an entity and runs
/// requests through their levels
#[derive(Debug, Clone)]
pub struct ApprovalEngine<S: ApprovalStore> {
    store: S,
}

impl<S: ApprovalStore> ApprovalEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate and persist a workflow definition
    pub async fn register_workflow(
        &self,
        workflow: ApprovalWorkflow,
    ) -> WorkflowResult<ApprovalWorkflow> {
        workflow.validate()?;
        self.store.insert_workflow(&workflow).await?;
        info!(
            workflow = %workflow.code,
            entity_type = %workflow.entity_type,
            levels = workflow.number_of_levels,
            "workflow registered"
        );
        Ok(workflow)
    }

    /// Pick the workflow governing an entity: among active definitions whose
    /// scope matches, the highest priority wins; ties break on code.
    pub async fn resolve(
        &self,
        entity_type: &str,
        amount: Option<&BigDecimal>,
        branch_id: Option<Uuid>,
    ) -> WorkflowResult<ApprovalWorkflow> {
        let mut candidates: Vec<ApprovalWorkflow> = self
            .store
            .list_workflows(entity_type)
            .await?
            .into_iter()
            .filter(|w| w.applies_to(entity_type, amount, branch_id))
            .filter(|w| w.validate().is_ok())
            .collect();

        candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.code.cmp(&b.code)));

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| WorkflowError::NoMatchingWorkflow {
                entity_type: entity_type.to_string(),
                amount: amount.cloned(),
            })
    }

    /// Open a pending request for an entity under the given workflow
    pub async fn open_request(
        &self,
        workflow: &ApprovalWorkflow,
        entity_id: Uuid,
        submitted_by: &str,
        amount: Option<BigDecimal>,
    ) -> WorkflowResult<ApprovalRequest> {
        let request = ApprovalRequest::new(workflow, entity_id, submitted_by, amount);
        self.store.insert_request(&request).await?;
        info!(
            request_id = %request.id,
            workflow = %workflow.code,
            entity_id = %entity_id,
            submitted_by,
            "approval request opened"
        );
        Ok(request)
    }

    /// Record one approver's sign-off at the request's current level
    pub async fn approve(
        &self,
        request_id: Uuid,
        approver_id: &str,
        comments: Option<String>,
    ) -> WorkflowResult<ApprovalRequest> {
        let mut request = self.must_get_request(request_id).await?;
        let workflow = self
            .store
            .get_workflow(request.workflow_id)
            .await?
            .ok_or(WorkflowError::WorkflowNotFound {
                workflow_id: request.workflow_id,
            })?;

        let expected = request.version;
        request.record_approval(&workflow, approver_id, comments)?;
        request.version += 1;
        self.store.update_request(&request, expected).await?;

        info!(
            request_id = %request.id,
            approver = approver_id,
            level = request.decisions.last().map(|d| d.level).unwrap_or(0),
            status = %request.status,
            "approval recorded"
        );
        Ok(request)
    }

    /// Record a rejection; terminal at any level
    pub async fn reject(
        &self,
        request_id: Uuid,
        approver_id: &str,
        comments: Option<String>,
    ) -> WorkflowResult<ApprovalRequest> {
        let mut request = self.must_get_request(request_id).await?;
        let expected = request.version;
        request.record_rejection(approver_id, comments)?;
        request.version += 1;
        self.store.update_request(&request, expected).await?;

        info!(
            request_id = %request.id,
            approver = approver_id,
            "rejection recorded"
        );
        Ok(request)
    }

    /// Withdraw a pending request
    pub async fn cancel(&self, request_id: Uuid, reason: &str) -> WorkflowResult<ApprovalRequest> {
        let mut request = self.must_get_request(request_id).await?;
        let expected = request.version;
        request.cancel(reason)?;
        request.version += 1;
        self.store.update_request(&request, expected).await?;

        info!(request_id = %request.id, reason, "approval request cancelled");
        Ok(request)
    }

    pub async fn get_request(&self, request_id: Uuid) -> WorkflowResult<ApprovalRequest> {
        self.must_get_request(request_id).await
    }

    async fn must_get_request(&self, request_id: Uuid) -> WorkflowResult<ApprovalRequest> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or(WorkflowError::RequestNotFound { request_id })
    }
}
