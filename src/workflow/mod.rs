//! Generic multi-level approval workflow engine
//!
//! Nothing in this module knows about posting batches: workflows gate any
//! entity type by name, and the posting service is just one caller.

pub mod config;
pub mod engine;
pub mod request;

pub use config::*;
pub use engine::*;
pub use request::*;

use bigdecimal::BigDecimal;
use uuid::Uuid;

/// Errors raised by the approval workflow engine
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid workflow configuration: {0}")]
    InvalidConfiguration(String),
    #[error("no active workflow matches entity type {entity_type} (amount {amount:?})")]
    NoMatchingWorkflow {
        entity_type: String,
        amount: Option<BigDecimal>,
    },
    #[error("request {request_id} is already {status}")]
    AlreadyDecided {
        request_id: Uuid,
        status: RequestStatus,
    },
    #[error("approver {approver_id} already decided level {level} of request {request_id}")]
    DuplicateApprover {
        request_id: Uuid,
        level: u32,
        approver_id: String,
    },
    #[error("approval request not found: {request_id}")]
    RequestNotFound { request_id: Uuid },
    #[error("workflow not found: {workflow_id}")]
    WorkflowNotFound { workflow_id: Uuid },
    #[error("stale version: expected {expected_version}, stored {actual_version}")]
    ConcurrentModification {
        expected_version: u64,
        actual_version: u64,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
