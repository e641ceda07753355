//! In-memory implementations of every collaborator, for testing and development

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::events::{DomainEvent, EventPublisher};
use crate::traits::*;
use crate::types::*;
use crate::workflow::{
    ApprovalRequest, ApprovalStore, ApprovalWorkflow, WorkflowError, WorkflowResult,
};

/// In-memory store for batches, workflows, and approval requests.
///
/// Clones share the same underlying maps, so one instance can be handed to
/// the posting service and to test assertions at the same time. Version
/// checks behave like a real backend: stale writers are refused.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    batches: Arc<RwLock<HashMap<Uuid, PostingBatch>>>,
    workflows: Arc<RwLock<HashMap<Uuid, ApprovalWorkflow>>>,
    requests: Arc<RwLock<HashMap<Uuid, ApprovalRequest>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            batches: Arc::new(RwLock::new(HashMap::new())),
            workflows: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.batches.write().unwrap().clear();
        self.workflows.write().unwrap().clear();
        self.requests.write().unwrap().clear();
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchStore for MemoryStorage {
    async fn insert_batch(&self, batch: &PostingBatch) -> PostingResult<()> {
        let mut batches = self.batches.write().unwrap();
        if batches
            .values()
            .any(|b| b.batch_number == batch.batch_number)
        {
            return Err(PostingError::DuplicateBatchNumber {
                batch_number: batch.batch_number.clone(),
            });
        }
        batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn get_batch(&self, batch_id: Uuid) -> PostingResult<Option<PostingBatch>> {
        Ok(self.batches.read().unwrap().get(&batch_id).cloned())
    }

    async fn find_batch_by_number(
        &self,
        batch_number: &str,
    ) -> PostingResult<Option<PostingBatch>> {
        Ok(self
            .batches
            .read()
            .unwrap()
            .values()
            .find(|b| b.batch_number == batch_number)
            .cloned())
    }

    async fn update_batch(
        &self,
        batch: &PostingBatch,
        expected_version: u64,
    ) -> PostingResult<()> {
        let mut batches = self.batches.write().unwrap();
        let current = batches
            .get(&batch.id)
            .ok_or(PostingError::BatchNotFound { batch_id: batch.id })?;
        if current.version != expected_version {
            return Err(PostingError::ConcurrentModification {
                expected_version,
                actual_version: current.version,
            });
        }
        batches.insert(batch.id, batch.clone());
        Ok(())
    }
}

#[async_trait]
impl ApprovalStore for MemoryStorage {
    async fn insert_workflow(&self, workflow: &ApprovalWorkflow) -> WorkflowResult<()> {
        let mut workflows = self.workflows.write().unwrap();
        if workflows.values().any(|w| w.code == workflow.code) {
            return Err(WorkflowError::InvalidConfiguration(format!(
                "workflow code already in use: {}",
                workflow.code
            )));
        }
        workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn get_workflow(&self, workflow_id: Uuid) -> WorkflowResult<Option<ApprovalWorkflow>> {
        Ok(self.workflows.read().unwrap().get(&workflow_id).cloned())
    }

    async fn list_workflows(&self, entity_type: &str) -> WorkflowResult<Vec<ApprovalWorkflow>> {
        Ok(self
            .workflows
            .read()
            .unwrap()
            .values()
            .filter(|w| w.entity_type == entity_type)
            .cloned()
            .collect())
    }

    async fn insert_request(&self, request: &ApprovalRequest) -> WorkflowResult<()> {
        self.requests
            .write()
            .unwrap()
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn get_request(&self, request_id: Uuid) -> WorkflowResult<Option<ApprovalRequest>> {
        Ok(self.requests.read().unwrap().get(&request_id).cloned())
    }

    async fn update_request(
        &self,
        request: &ApprovalRequest,
        expected_version: u64,
    ) -> WorkflowResult<()> {
        let mut requests = self.requests.write().unwrap();
        let current = requests
            .get(&request.id)
            .ok_or(WorkflowError::RequestNotFound {
                request_id: request.id,
            })?;
        if current.version != expected_version {
            return Err(WorkflowError::ConcurrentModification {
                expected_version,
                actual_version: current.version,
            });
        }
        requests.insert(request.id, request.clone());
        Ok(())
    }
}

/// In-memory chart-of-accounts directory
#[derive(Debug, Clone)]
pub struct MemoryAccountDirectory {
    accounts: Arc<RwLock<HashMap<String, (AccountType, bool)>>>,
}

impl MemoryAccountDirectory {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register an account code with its type and postability
    pub fn add_account(&self, account_id: &str, account_type: AccountType, allows_posting: bool) {
        self.accounts
            .write()
            .unwrap()
            .insert(account_id.to_string(), (account_type, allows_posting));
    }
}

impl Default for MemoryAccountDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn account_exists(&self, account_id: &str) -> PostingResult<bool> {
        Ok(self.accounts.read().unwrap().contains_key(account_id))
    }

    async fn account_type(&self, account_id: &str) -> PostingResult<Option<AccountType>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .get(account_id)
            .map(|(account_type, _)| account_type.clone()))
    }

    async fn allows_posting(&self, account_id: &str) -> PostingResult<bool> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .get(account_id)
            .map(|(_, allows)| *allows)
            .unwrap_or(false))
    }
}

/// In-memory accounting-period calendar
#[derive(Debug, Clone)]
pub struct MemoryPeriodCalendar {
    periods: Arc<RwLock<Vec<(NaiveDate, NaiveDate, PeriodRef)>>>,
}

impl MemoryPeriodCalendar {
    pub fn new() -> Self {
        Self {
            periods: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a period covering an inclusive date range
    pub fn add_period(&self, start: NaiveDate, end: NaiveDate, status: PeriodStatus) -> Uuid {
        let period_id = Uuid::new_v4();
        self.periods.write().unwrap().push((
            start,
            end,
            PeriodRef { period_id, status },
        ));
        period_id
    }

    /// Change a period's status, e.g. to close it mid-test
    pub fn set_status(&self, period_id: Uuid, status: PeriodStatus) {
        let mut periods = self.periods.write().unwrap();
        for (_, _, period) in periods.iter_mut() {
            if period.period_id == period_id {
                period.status = status.clone();
            }
        }
    }
}

impl Default for MemoryPeriodCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeriodCalendar for MemoryPeriodCalendar {
    async fn resolve_period(&self, date: NaiveDate) -> PostingResult<Option<PeriodRef>> {
        Ok(self
            .periods
            .read()
            .unwrap()
            .iter()
            .find(|(start, end, _)| *start <= date && date <= *end)
            .map(|(_, _, period)| period.clone()))
    }
}

/// Publisher that records every event; assertions read them back
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    events: Arc<RwLock<Vec<DomainEvent>>>,
    failing: Arc<RwLock<bool>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            failing: Arc::new(RwLock::new(false)),
        }
    }

    /// Everything published so far, in order
    pub fn published(&self) -> Vec<DomainEvent> {
        self.events.read().unwrap().clone()
    }

    /// Make every publish fail until turned off again
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write().unwrap() = failing;
    }
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), String> {
        if *self.failing.read().unwrap() {
            return Err("publisher unavailable".to_string());
        }
        self.events.write().unwrap().push(event.clone());
        Ok(())
    }
}
