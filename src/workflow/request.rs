//! Approval request instances and their decision log

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApprovalWorkflow, WorkflowError, WorkflowResult};

/// Lifecycle states of an approval request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Waiting on one or more approvers
    Pending,
    /// Every level cleared; terminal
    Approved,
    /// An approver said no; terminal
    Rejected,
    /// Withdrawn before completion; terminal
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an approver decided
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected,
}

/// One approver's recorded decision at one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Who decided
    pub approver_id: String,
    /// Level the decision was taken at
    pub level: u32,
    /// Approved or rejected
    pub decision: Decision,
    /// Optional remarks
    pub comments: Option<String>,
    /// When the decision was recorded
    pub decided_at: NaiveDateTime,
}

/// A running instance of a workflow against one entity.
///
/// `current_level` starts at 1 and only ever moves up; the decision log is
/// append-only. Once the status leaves `Pending` nothing may change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique identifier
    pub id: Uuid,
    /// Workflow this request runs under
    pub workflow_id: Uuid,
    /// Entity type copied from the workflow
    pub entity_type: String,
    /// The entity being approved
    pub entity_id: Uuid,
    /// Monetary amount the workflow was resolved on, when there is one
    pub amount: Option<BigDecimal>,
    /// Level currently awaiting decisions, 1-based
    pub current_level: u32,
    /// Total levels the workflow demands
    pub total_levels: u32,
    /// Lifecycle state
    pub status: RequestStatus,
    /// Ordered decision log
    pub decisions: Vec<ApprovalDecision>,
    /// Who submitted the entity for approval
    pub submitted_by: String,
    /// When the request was opened
    pub submitted_at: NaiveDateTime,
    /// When the request reached a terminal status
    pub completed_at: Option<NaiveDateTime>,
    /// Reason supplied on cancellation
    pub cancel_reason: Option<String>,
    /// Optimistic concurrency token, bumped on every store write
    pub version: u64,
}

impl ApprovalRequest {
    /// Open a pending request at level 1
    pub fn new(
        workflow: &ApprovalWorkflow,
        entity_id: Uuid,
        submitted_by: &str,
        amount: Option<BigDecimal>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id: workflow.id,
            entity_type: workflow.entity_type.clone(),
            entity_id,
            amount,
            current_level: 1,
            total_levels: workflow.number_of_levels,
            status: RequestStatus::Pending,
            decisions: Vec::new(),
            submitted_by: submitted_by.to_string(),
            submitted_at: chrono::Utc::now().naive_utc(),
            completed_at: None,
            cancel_reason: None,
            version: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Approvals already recorded at a level
    pub fn approvals_at(&self, level: u32) -> usize {
        self.decisions
            .iter()
            .filter(|d| d.level == level && d.decision == Decision::Approved)
            .count()
    }

    /// The decision that ended the request, once terminal
    pub fn final_decision(&self) -> Option<&ApprovalDecision> {
        match self.status {
            RequestStatus::Approved | RequestStatus::Rejected => self.decisions.last(),
            _ => None,
        }
    }

    fn guard_open(&self) -> WorkflowResult<()> {
        if self.status != RequestStatus::Pending {
            return Err(WorkflowError::AlreadyDecided {
                request_id: self.id,
                status: self.status.clone(),
            });
        }
        Ok(())
    }

    /// Record one approver's sign-off at the current level.
    ///
    /// Sequential workflows advance on every approval; parallel workflows
    /// advance once the level's required number of distinct approvers have
    /// signed. Clearing the final level flips the request to `Approved`.
    pub fn record_approval(
        &mut self,
        workflow: &ApprovalWorkflow,
        approver_id: &str,
        comments: Option<String>,
    ) -> WorkflowResult<()> {
        self.guard_open()?;
        if workflow.id != self.workflow_id {
            return Err(WorkflowError::InvalidConfiguration(format!(
                "workflow {} does not own request {}",
                workflow.code, self.id
            )));
        }
        let level = self.current_level;
        if self
            .decisions
            .iter()
            .any(|d| d.level == level && d.approver_id == approver_id)
        {
            return Err(WorkflowError::DuplicateApprover {
                request_id: self.id,
                level,
                approver_id: approver_id.to_string(),
            });
        }

        self.decisions.push(ApprovalDecision {
            approver_id: approver_id.to_string(),
            level,
            decision: Decision::Approved,
            comments,
            decided_at: chrono::Utc::now().naive_utc(),
        });

        let required = workflow.required_approvals_at(level) as usize;
        if self.approvals_at(level) >= required {
            self.current_level += 1;
            if self.current_level > self.total_levels {
                self.status = RequestStatus::Approved;
                self.completed_at = Some(chrono::Utc::now().naive_utc());
            }
        }
        Ok(())
    }

    /// Record a rejection. One rejection at any level ends the request.
    pub fn record_rejection(
        &mut self,
        approver_id: &str,
        comments: Option<String>,
    ) -> WorkflowResult<()> {
        self.guard_open()?;
        self.decisions.push(ApprovalDecision {
            approver_id: approver_id.to_string(),
            level: self.current_level,
            decision: Decision::Rejected,
            comments,
            decided_at: chrono::Utc::now().naive_utc(),
        });
        self.status = RequestStatus::Rejected;
        self.completed_at = Some(chrono::Utc::now().naive_utc());
        Ok(())
    }

    /// Withdraw a pending request
    pub fn cancel(&mut self, reason: &str) -> WorkflowResult<()> {
        self.guard_open()?;
        self.status = RequestStatus::Cancelled;
        self.cancel_reason = Some(reason.to_string());
        self.completed_at = Some(chrono::Utc::now().naive_utc());
        Ok(())
    }
}
