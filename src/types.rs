//! Core types and data structures for the posting engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowError;

/// Account classifications used by the chart-of-accounts directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Inventory, Equipment, etc.)
    Asset,
    /// Liabilities - what the business owes (Loans, Accounts Payable, etc.)
    Liability,
    /// Equity - owner's interest in the business (Capital, Retained Earnings, etc.)
    Equity,
    /// Income/Revenue - money earned by the business
    Income,
    /// Expenses - costs incurred by the business
    Expense,
}

/// Lifecycle states of a posting batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Being assembled; entries may be added or removed
    Draft,
    /// Submitted and waiting on an approval request
    PendingApproval,
    /// Cleared for posting
    Approved,
    /// Turned down by an approver; terminal
    Rejected,
    /// Written to the ledger; entries are immutable
    Posted,
    /// Posted and later offset by a reversal batch; terminal
    Reversed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Draft => "Draft",
            BatchStatus::PendingApproval => "PendingApproval",
            BatchStatus::Approved => "Approved",
            BatchStatus::Rejected => "Rejected",
            BatchStatus::Posted => "Posted",
            BatchStatus::Reversed => "Reversed",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of an accounting period as reported by the period calendar
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodStatus {
    /// Accepts postings
    Open,
    /// Rejects postings
    Closed,
    /// Year-end window; accepts postings but flags non-adjusting entries
    Adjustment,
}

/// Resolved accounting period for a posting date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRef {
    pub period_id: Uuid,
    pub status: PeriodStatus,
}

/// Non-blocking signal raised by period validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodWarning {
    pub period_id: Uuid,
    pub message: String,
}

/// Single debit-or-credit movement against one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Chart-of-accounts code being hit
    pub account_id: String,
    /// Debit amount; zero when the line is a credit
    pub debit: BigDecimal,
    /// Credit amount; zero when the line is a debit
    pub credit: BigDecimal,
    /// Optional line-level memo
    pub memo: Option<String>,
}

impl JournalLine {
    /// Create a line, enforcing the one-sided shape rule
    pub fn new(
        account_id: String,
        debit: BigDecimal,
        credit: BigDecimal,
        memo: Option<String>,
    ) -> PostingResult<Self> {
        let zero = BigDecimal::from(0);
        if debit < zero || credit < zero {
            return Err(PostingError::InvalidLine {
                reason: format!("amounts must not be negative ({account_id})"),
            });
        }
        if debit > zero && credit > zero {
            return Err(PostingError::InvalidLine {
                reason: format!("line cannot carry both a debit and a credit ({account_id})"),
            });
        }
        if debit == zero && credit == zero {
            return Err(PostingError::InvalidLine {
                reason: format!("line must carry a debit or a credit ({account_id})"),
            });
        }
        Ok(Self {
            account_id,
            debit,
            credit,
            memo,
        })
    }

    /// Create a debit line
    pub fn debit(account_id: String, amount: BigDecimal, memo: Option<String>) -> PostingResult<Self> {
        Self::new(account_id, amount, BigDecimal::from(0), memo)
    }

    /// Create a credit line
    pub fn credit(account_id: String, amount: BigDecimal, memo: Option<String>) -> PostingResult<Self> {
        Self::new(account_id, BigDecimal::from(0), amount, memo)
    }

    pub fn is_debit(&self) -> bool {
        self.debit > BigDecimal::from(0)
    }

    /// Mirror of this line with the debit and credit sides swapped
    pub fn reversed(&self) -> Self {
        Self {
            account_id: self.account_id.clone(),
            debit: self.credit.clone(),
            credit: self.debit.clone(),
            memo: self.memo.clone(),
        }
    }
}

/// Journal entry: an ordered set of lines that must balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier for the entry
    pub id: Uuid,
    /// Business date of the entry
    pub entry_date: NaiveDate,
    /// Document reference (invoice number, voucher number, etc.)
    pub reference: String,
    /// Description of what the entry records
    pub description: String,
    /// Originating subsystem, when the entry was generated
    pub source_module: Option<String>,
    /// Identifier inside the originating subsystem
    pub source_id: Option<String>,
    /// Marks a year-end adjusting entry; relevant in adjustment periods
    pub is_adjusting: bool,
    /// Set when the owning batch posts; lines are frozen from then on
    pub is_posted: bool,
    /// Lines in insertion order
    pub lines: Vec<JournalLine>,
    /// When the entry was created
    pub created_at: NaiveDateTime,
    /// When the entry was last updated
    pub updated_at: NaiveDateTime,
}

impl JournalEntry {
    /// Create an empty entry
    pub fn new(entry_date: NaiveDate, reference: String, description: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            entry_date,
            reference,
            description,
            source_module: None,
            source_id: None,
            is_adjusting: false,
            is_posted: false,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a line; refused once the entry has been posted
    pub fn add_line(&mut self, line: JournalLine) -> PostingResult<()> {
        if self.is_posted {
            return Err(PostingError::Validation(format!(
                "entry {} is posted and cannot take new lines",
                self.id
            )));
        }
        self.lines.push(line);
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    /// Sum of all debit amounts
    pub fn total_debit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    /// Sum of all credit amounts
    pub fn total_credit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    /// Check whether debits equal credits
    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }

    /// Validate the entry shape: at least two lines, balanced, nonzero
    pub fn validate(&self) -> PostingResult<()> {
        if self.lines.len() < 2 {
            return Err(PostingError::InsufficientLines {
                entry_id: self.id,
                count: self.lines.len(),
            });
        }
        let total_debit = self.total_debit();
        let total_credit = self.total_credit();
        if total_debit != total_credit || total_debit == BigDecimal::from(0) {
            return Err(PostingError::UnbalancedEntry {
                entry_id: self.id,
                total_debit,
                total_credit,
            });
        }
        Ok(())
    }

    pub(crate) fn mark_posted(&mut self) {
        self.is_posted = true;
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    /// Mirror entry that offsets this one line-for-line
    pub fn reversed(&self, entry_date: NaiveDate) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            entry_date,
            reference: format!("REV-{}", self.reference),
            description: format!("Reversal of {}", self.description),
            source_module: Some("reversal".to_string()),
            source_id: Some(self.id.to_string()),
            is_adjusting: self.is_adjusting,
            is_posted: false,
            lines: self.lines.iter().map(JournalLine::reversed).collect(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Posting batch: the aggregate that moves through the approval and
/// posting lifecycle. Status is only ever changed by the posting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingBatch {
    /// Unique identifier for the batch
    pub id: Uuid,
    /// Human-assigned batch number, unique across the store
    pub batch_number: String,
    /// Business date the batch posts under
    pub batch_date: NaiveDate,
    /// Accounting period resolved from the batch date, when known
    pub period_id: Option<Uuid>,
    /// Current lifecycle state
    pub status: BatchStatus,
    /// Free-form description
    pub description: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Branch scope used when resolving an approval workflow
    pub branch_id: Option<Uuid>,
    /// Approval request gating this batch, while one is open
    pub approval_request_id: Option<Uuid>,
    /// Journal entries in the batch
    pub entries: Vec<JournalEntry>,
    /// Who approved the batch (or who self-approved it)
    pub approved_by: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    /// Who posted the batch
    pub posted_by: Option<String>,
    pub posted_at: Option<NaiveDateTime>,
    /// When this batch is a reversal: the batch it offsets
    pub reversal_of: Option<Uuid>,
    /// When this batch has been reversed: the offsetting batch
    pub reversed_by: Option<Uuid>,
    /// Reason captured when the reversal was requested
    pub reversal_reason: Option<String>,
    /// Optimistic concurrency token, bumped by the store on every write
    pub version: u64,
    /// When the batch was created
    pub created_at: NaiveDateTime,
    /// When the batch was last updated
    pub updated_at: NaiveDateTime,
}

impl PostingBatch {
    /// Create a draft batch
    pub fn new(batch_number: String, batch_date: NaiveDate) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            batch_number,
            batch_date,
            period_id: None,
            status: BatchStatus::Draft,
            description: None,
            notes: None,
            branch_id: None,
            approval_request_id: None,
            entries: Vec::new(),
            approved_by: None,
            approved_at: None,
            posted_by: None,
            posted_at: None,
            reversal_of: None,
            reversed_by: None,
            reversal_reason: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this batch exists to offset another one
    pub fn is_reversal(&self) -> bool {
        self.reversal_of.is_some()
    }

    /// Add a journal entry; drafts only
    pub fn add_entry(&mut self, entry: JournalEntry) -> PostingResult<()> {
        if self.status != BatchStatus::Draft {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "add entry",
            });
        }
        self.entries.push(entry);
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    /// Remove a journal entry by id; drafts only
    pub fn remove_entry(&mut self, entry_id: Uuid) -> PostingResult<JournalEntry> {
        if self.status != BatchStatus::Draft {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "remove entry",
            });
        }
        let position = self
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| {
                PostingError::Validation(format!("entry {entry_id} is not in this batch"))
            })?;
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(self.entries.remove(position))
    }

    /// Update description/notes; drafts only
    pub fn update_details(
        &mut self,
        description: Option<String>,
        notes: Option<String>,
    ) -> PostingResult<()> {
        if self.status != BatchStatus::Draft {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "update details",
            });
        }
        self.description = description;
        self.notes = notes;
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    /// Sum of debit totals across all entries
    pub fn total_debit(&self) -> BigDecimal {
        self.entries.iter().map(|e| e.total_debit()).sum()
    }

    /// Sum of credit totals across all entries
    pub fn total_credit(&self) -> BigDecimal {
        self.entries.iter().map(|e| e.total_credit()).sum()
    }

    /// Check whether batch-level debits equal credits
    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }

    pub(crate) fn begin_approval(&mut self, request_id: Uuid) -> PostingResult<()> {
        if self.status != BatchStatus::Draft {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "submit",
            });
        }
        self.status = BatchStatus::PendingApproval;
        self.approval_request_id = Some(request_id);
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    pub(crate) fn self_approve(&mut self, actor: &str) -> PostingResult<()> {
        if self.status != BatchStatus::Draft {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "submit",
            });
        }
        self.status = BatchStatus::Approved;
        self.approved_by = Some(actor.to_string());
        self.approved_at = Some(chrono::Utc::now().naive_utc());
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    pub(crate) fn apply_approval(&mut self, approved_by: &str) -> PostingResult<()> {
        if self.status != BatchStatus::PendingApproval {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "approve",
            });
        }
        self.status = BatchStatus::Approved;
        self.approved_by = Some(approved_by.to_string());
        self.approved_at = Some(chrono::Utc::now().naive_utc());
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    pub(crate) fn apply_rejection(&mut self) -> PostingResult<()> {
        if self.status != BatchStatus::PendingApproval {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "reject",
            });
        }
        self.status = BatchStatus::Rejected;
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    pub(crate) fn revert_to_draft(&mut self) -> PostingResult<()> {
        if self.status != BatchStatus::PendingApproval {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "cancel approval",
            });
        }
        self.status = BatchStatus::Draft;
        self.approval_request_id = None;
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    pub(crate) fn mark_posted(&mut self, actor: &str) -> PostingResult<()> {
        if self.status != BatchStatus::Approved {
            return Err(PostingError::NotApproved {
                batch_id: self.id,
                status: self.status.clone(),
            });
        }
        self.status = BatchStatus::Posted;
        for entry in &mut self.entries {
            entry.mark_posted();
        }
        self.posted_by = Some(actor.to_string());
        self.posted_at = Some(chrono::Utc::now().naive_utc());
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    pub(crate) fn link_reversal(&mut self, reversal_id: Uuid, reason: &str) -> PostingResult<()> {
        if self.status != BatchStatus::Posted {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "reverse",
            });
        }
        if let Some(existing) = self.reversed_by {
            return Err(PostingError::AlreadyReversed {
                batch_id: self.id,
                reversal_id: existing,
            });
        }
        self.reversed_by = Some(reversal_id);
        self.reversal_reason = Some(reason.to_string());
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    pub(crate) fn clear_reversal_link(&mut self) {
        self.reversed_by = None;
        self.reversal_reason = None;
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    pub(crate) fn mark_reversed(&mut self) -> PostingResult<()> {
        if self.status != BatchStatus::Posted || self.reversed_by.is_none() {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "mark reversed",
            });
        }
        self.status = BatchStatus::Reversed;
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    /// Build the mirror batch that offsets this one. The caller supplies
    /// the new batch number; entries are mirrored line-for-line.
    pub fn build_reversal(
        &self,
        batch_number: String,
        batch_date: NaiveDate,
        reason: &str,
    ) -> PostingResult<Self> {
        if self.status != BatchStatus::Posted {
            return Err(PostingError::IllegalTransition {
                batch_id: self.id,
                from: self.status.clone(),
                action: "reverse",
            });
        }
        let mut reversal = PostingBatch::new(batch_number, batch_date);
        reversal.description = Some(format!("Reversal of batch {}", self.batch_number));
        reversal.notes = Some(reason.to_string());
        reversal.branch_id = self.branch_id;
        reversal.reversal_of = Some(self.id);
        reversal.reversal_reason = Some(reason.to_string());
        reversal.entries = self
            .entries
            .iter()
            .map(|e| e.reversed(batch_date))
            .collect();
        Ok(reversal)
    }
}

/// Errors that can occur in the posting engine
#[derive(Debug, thiserror::Error)]
pub enum PostingError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid journal line: {reason}")]
    InvalidLine { reason: String },
    #[error("entry {entry_id} is unbalanced: debits {total_debit}, credits {total_credit}")]
    UnbalancedEntry {
        entry_id: Uuid,
        total_debit: BigDecimal,
        total_credit: BigDecimal,
    },
    #[error("entry {entry_id} needs at least two lines, found {count}")]
    InsufficientLines { entry_id: Uuid, count: usize },
    #[error("batch {batch_id} is unbalanced: debits {total_debit}, credits {total_credit}")]
    UnbalancedBatch {
        batch_id: Uuid,
        total_debit: BigDecimal,
        total_credit: BigDecimal,
    },
    #[error("account not found: {account_id}")]
    AccountNotFound { account_id: String },
    #[error("account {account_id} does not allow direct posting")]
    AccountNotPostable { account_id: String },
    #[error("period {period_id} is closed for posting date {date}")]
    PeriodClosed { period_id: Uuid, date: NaiveDate },
    #[error("no accounting period covers {date}")]
    PeriodNotFound { date: NaiveDate },
    #[error("batch {batch_id} is {status} and cannot be posted")]
    NotApproved { batch_id: Uuid, status: BatchStatus },
    #[error("batch {batch_id} is {from}: cannot {action}")]
    IllegalTransition {
        batch_id: Uuid,
        from: BatchStatus,
        action: &'static str,
    },
    #[error("batch {batch_id} was already reversed by batch {reversal_id}")]
    AlreadyReversed { batch_id: Uuid, reversal_id: Uuid },
    #[error("batch number already in use: {batch_number}")]
    DuplicateBatchNumber { batch_number: String },
    #[error("batch not found: {batch_id}")]
    BatchNotFound { batch_id: Uuid },
    #[error("stale version: expected {expected_version}, stored {actual_version}")]
    ConcurrentModification {
        expected_version: u64,
        actual_version: u64,
    },
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Result type for posting operations
pub type PostingResult<T> = Result<T, PostingError>;
