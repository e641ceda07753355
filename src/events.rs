//! Domain events emitted after successful state transitions

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::Decision;

/// Events other subsystems (notifications, audit trails, downstream books)
/// subscribe to. Published after the owning transition has been persisted;
/// delivery is best-effort and never rolls a transition back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    BatchSubmitted {
        batch_id: Uuid,
        batch_number: String,
        total_debit: BigDecimal,
        total_credit: BigDecimal,
        approval_request_id: Option<Uuid>,
    },
    BatchApproved {
        batch_id: Uuid,
        batch_number: String,
        approved_by: String,
    },
    BatchRejected {
        batch_id: Uuid,
        batch_number: String,
        rejected_by: String,
    },
    BatchPosted {
        batch_id: Uuid,
        batch_number: String,
        posted_by: String,
        total_debit: BigDecimal,
    },
    BatchReversed {
        batch_id: Uuid,
        batch_number: String,
        reversal_batch_id: Uuid,
        reason: String,
    },
    ApprovalLevelDecided {
        request_id: Uuid,
        entity_id: Uuid,
        level: u32,
        decision: Decision,
        approver_id: String,
    },
}

impl DomainEvent {
    /// Stable name used in logs and by routing subscribers
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::BatchSubmitted { .. } => "batch.submitted",
            DomainEvent::BatchApproved { .. } => "batch.approved",
            DomainEvent::BatchRejected { .. } => "batch.rejected",
            DomainEvent::BatchPosted { .. } => "batch.posted",
            DomainEvent::BatchReversed { .. } => "batch.reversed",
            DomainEvent::ApprovalLevelDecided { .. } => "approval.level_decided",
        }
    }
}

/// Outbound event channel. Implementations deliver to a bus, an outbox
/// table, or nowhere at all; the posting service logs failures and moves on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), String>;
}

/// Publisher that drops every event; useful when no subscriber exists
#[derive(Debug, Clone, Default)]
pub struct NullPublisher;

#[async_trait]
impl EventPublisher for NullPublisher {
    async fn publish(&self, _event: &DomainEvent) -> Result<(), String> {
        Ok(())
    }
}
