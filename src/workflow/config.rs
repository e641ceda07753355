//! Workflow definitions: which approval chain applies to which entities

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{WorkflowError, WorkflowResult};

/// Per-level configuration within a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    /// 1-based level number
    pub level: u32,
    /// Informational label (role or desk name)
    pub name: Option<String>,
    /// Distinct approvals needed before the level clears.
    /// Only meaningful for parallel workflows; sequential levels clear on one.
    pub required_approvals: u32,
}

impl ApprovalLevel {
    pub fn new(level: u32) -> Self {
        Self {
            level,
            name: None,
            required_approvals: 1,
        }
    }
}

/// Approval workflow definition: how many levels, in what mode, and the
/// entity/amount/branch scope it applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    /// Unique identifier
    pub id: Uuid,
    /// Short unique code, stored uppercased
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// Entity type this workflow gates (e.g. "PostingBatch")
    pub entity_type: String,
    /// Number of approval levels, at least one
    pub number_of_levels: u32,
    /// Sequential: levels clear one at a time. Parallel: a level clears
    /// once its required number of distinct approvers have signed off.
    pub is_sequential: bool,
    /// Resolution rank; the highest-priority matching workflow wins
    pub priority: i32,
    /// Inclusive lower amount bound, when scoped by amount
    pub min_amount: Option<BigDecimal>,
    /// Inclusive upper amount bound, when scoped by amount
    pub max_amount: Option<BigDecimal>,
    /// Branch scope; unscoped workflows match any branch
    pub branch_id: Option<Uuid>,
    /// Inactive workflows never match
    pub is_active: bool,
    /// Per-level configuration, one slot per level
    pub levels: Vec<ApprovalLevel>,
    /// When the workflow was created
    pub created_at: NaiveDateTime,
    /// When the workflow was last updated
    pub updated_at: NaiveDateTime,
}

impl ApprovalWorkflow {
    /// Create a sequential workflow with default per-level configuration
    pub fn new(
        code: &str,
        name: &str,
        entity_type: &str,
        number_of_levels: u32,
    ) -> WorkflowResult<Self> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(WorkflowError::InvalidConfiguration(
                "workflow code must not be blank".to_string(),
            ));
        }
        if name.trim().is_empty() {
            return Err(WorkflowError::InvalidConfiguration(
                "workflow name must not be blank".to_string(),
            ));
        }
        if entity_type.trim().is_empty() {
            return Err(WorkflowError::InvalidConfiguration(
                "workflow entity type must not be blank".to_string(),
            ));
        }
        if number_of_levels == 0 {
            return Err(WorkflowError::InvalidConfiguration(
                "workflow needs at least one approval level".to_string(),
            ));
        }
        let now = chrono::Utc::now().naive_utc();
        Ok(Self {
            id: Uuid::new_v4(),
            code,
            name: name.trim().to_string(),
            entity_type: entity_type.trim().to_string(),
            number_of_levels,
            is_sequential: true,
            priority: 100,
            min_amount: None,
            max_amount: None,
            branch_id: None,
            is_active: true,
            levels: (1..=number_of_levels).map(ApprovalLevel::new).collect(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Scope the workflow to an amount range (either bound optional)
    pub fn with_amount_range(
        mut self,
        min_amount: Option<BigDecimal>,
        max_amount: Option<BigDecimal>,
    ) -> Self {
        self.min_amount = min_amount;
        self.max_amount = max_amount;
        self
    }

    /// Scope the workflow to a single branch
    pub fn for_branch(mut self, branch_id: Uuid) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    /// Set the resolution priority (higher wins)
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Label a level
    pub fn with_level_name(mut self, level: u32, name: &str) -> Self {
        if let Some(slot) = self.levels.iter_mut().find(|l| l.level == level) {
            slot.name = Some(name.to_string());
        }
        self
    }

    /// Switch to parallel mode. `required_per_level[i]` is the number of
    /// distinct approvers level `i + 1` needs; unlisted levels need one.
    pub fn parallel(mut self, required_per_level: Vec<u32>) -> Self {
        self.is_sequential = false;
        for (slot, required) in self.levels.iter_mut().zip(required_per_level) {
            slot.required_approvals = required.max(1);
        }
        self
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    /// Check structural soundness; run before registering or resolving
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.number_of_levels == 0 {
            return Err(WorkflowError::InvalidConfiguration(format!(
                "workflow {} has no approval levels",
                self.code
            )));
        }
        if self.levels.len() != self.number_of_levels as usize {
            return Err(WorkflowError::InvalidConfiguration(format!(
                "workflow {} declares {} levels but configures {}",
                self.code,
                self.number_of_levels,
                self.levels.len()
            )));
        }
        if self.levels.iter().any(|l| l.required_approvals == 0) {
            return Err(WorkflowError::InvalidConfiguration(format!(
                "workflow {} has a level requiring zero approvals",
                self.code
            )));
        }
        if let (Some(min), Some(max)) = (&self.min_amount, &self.max_amount) {
            if min > max {
                return Err(WorkflowError::InvalidConfiguration(format!(
                    "workflow {} amount range is inverted: {} > {}",
                    self.code, min, max
                )));
            }
        }
        Ok(())
    }

    /// Whether this workflow governs the given entity/amount/branch
    pub fn applies_to(
        &self,
        entity_type: &str,
        amount: Option<&BigDecimal>,
        branch_id: Option<Uuid>,
    ) -> bool {
        if !self.is_active || self.entity_type != entity_type {
            return false;
        }
        if let Some(scope) = self.branch_id {
            if branch_id != Some(scope) {
                return false;
            }
        }
        if let Some(min) = &self.min_amount {
            match amount {
                Some(a) if a >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = &self.max_amount {
            match amount {
                Some(a) if a <= max => {}
                _ => return false,
            }
        }
        true
    }

    /// Distinct approvals needed to clear a level
    pub fn required_approvals_at(&self, level: u32) -> u32 {
        if self.is_sequential {
            return 1;
        }
        self.levels
            .iter()
            .find(|l| l.level == level)
            .map(|l| l.required_approvals)
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workflow_defaults() {
        let workflow = ApprovalWorkflow::new("jrnl-std", "Standard journals", "PostingBatch", 2)
            .unwrap();
        assert_eq!(workflow.code, "JRNL-STD");
        assert!(workflow.is_sequential);
        assert!(workflow.is_active);
        assert_eq!(workflow.priority, 100);
        assert_eq!(workflow.levels.len(), 2);
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_zero_levels_rejected() {
        let result = ApprovalWorkflow::new("BAD", "Zero levels", "PostingBatch", 0);
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_applies_to_amount_range() {
        let workflow = ApprovalWorkflow::new("BIG", "Large journals", "PostingBatch", 3)
            .unwrap()
            .with_amount_range(Some(BigDecimal::from(10_000)), None);

        assert!(workflow.applies_to("PostingBatch", Some(&BigDecimal::from(10_000)), None));
        assert!(workflow.applies_to("PostingBatch", Some(&BigDecimal::from(50_000)), None));
        assert!(!workflow.applies_to("PostingBatch", Some(&BigDecimal::from(9_999)), None));
        assert!(!workflow.applies_to("PostingBatch", None, None));
        assert!(!workflow.applies_to("PurchaseOrder", Some(&BigDecimal::from(50_000)), None));
    }

    #[test]
    fn test_inactive_workflow_never_matches() {
        let mut workflow =
            ApprovalWorkflow::new("OFF", "Disabled", "PostingBatch", 1).unwrap();
        workflow.deactivate();
        assert!(!workflow.applies_to("PostingBatch", Some(&BigDecimal::from(1)), None));
        workflow.activate();
        assert!(workflow.applies_to("PostingBatch", Some(&BigDecimal::from(1)), None));
    }

    #[test]
    fn test_branch_scope() {
        let branch = Uuid::new_v4();
        let workflow = ApprovalWorkflow::new("BR", "Branch scoped", "PostingBatch", 1)
            .unwrap()
            .for_branch(branch);

        assert!(workflow.applies_to("PostingBatch", None, Some(branch)));
        assert!(!workflow.applies_to("PostingBatch", None, Some(Uuid::new_v4())));
        assert!(!workflow.applies_to("PostingBatch", None, None));
    }

    #[test]
    fn test_parallel_required_counts() {
        let workflow = ApprovalWorkflow::new("PAR", "Two reviewers", "PostingBatch", 2)
            .unwrap()
            .parallel(vec![2]);

        assert!(!workflow.is_sequential);
        assert_eq!(workflow.required_approvals_at(1), 2);
        assert_eq!(workflow.required_approvals_at(2), 1);
    }

    #[test]
    fn test_inverted_amount_range_invalid() {
        let workflow = ApprovalWorkflow::new("INV", "Inverted", "PostingBatch", 1)
            .unwrap()
            .with_amount_range(Some(BigDecimal::from(100)), Some(BigDecimal::from(10)));
        assert!(workflow.validate().is_err());
    }
}
