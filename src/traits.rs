//! Traits for storage abstraction and external collaborators

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::types::*;

/// Chart-of-accounts lookup owned by another subsystem.
///
/// The posting engine never writes accounts; it only checks that the
/// accounts a journal line touches exist and accept direct postings.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Whether the account exists at all
    async fn account_exists(&self, account_id: &str) -> PostingResult<bool>;

    /// Classification of the account, when it exists
    async fn account_type(&self, account_id: &str) -> PostingResult<Option<AccountType>>;

    /// Whether journal lines may hit the account directly
    /// (header/rollup accounts typically refuse)
    async fn allows_posting(&self, account_id: &str) -> PostingResult<bool>;
}

/// Accounting-period calendar owned by another subsystem.
#[async_trait]
pub trait PeriodCalendar: Send + Sync {
    /// Resolve the period covering a business date; `None` when no period
    /// has been set up for that date
    async fn resolve_period(&self, date: NaiveDate) -> PostingResult<Option<PeriodRef>>;
}

/// Storage abstraction for posting batches.
///
/// Works with any backend (PostgreSQL, MySQL, SQLite, in-memory, etc.).
/// `update_batch` is a compare-and-swap: callers pass the version they
/// loaded, implementations must refuse the write when the stored version
/// differs and persist the batch exactly as given otherwise.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Persist a new batch; refuses duplicate batch numbers
    async fn insert_batch(&self, batch: &PostingBatch) -> PostingResult<()>;

    /// Get a batch by id
    async fn get_batch(&self, batch_id: Uuid) -> PostingResult<Option<PostingBatch>>;

    /// Look a batch up by its human-assigned number
    async fn find_batch_by_number(&self, batch_number: &str)
        -> PostingResult<Option<PostingBatch>>;

    /// Compare-and-swap write of a changed batch
    async fn update_batch(&self, batch: &PostingBatch, expected_version: u64)
        -> PostingResult<()>;
}
