//! # Posting Core
//!
//! A financial posting engine built around balanced double-entry batches and
//! a generic multi-level approval workflow.
//!
//! ## Features
//!
//! - **Double-entry batches**: journal entries validated line by line, entry
//!   by entry, and across the whole batch before anything posts
//! - **Approval workflows**: sequential or parallel multi-level approvals,
//!   resolved by entity type, amount band, and branch
//! - **Posting lifecycle**: draft, submit, approve/reject, post, reverse,
//!   with every transition owned by one orchestrator
//! - **Reversals**: posted batches are offset by mirror batches that ride
//!   the same approval pipeline
//! - **Period policy**: closed periods block, adjustment periods warn
//! - **Storage abstraction**: database-agnostic design with trait-based
//!   stores and optimistic concurrency on every write
//!
//! ## Quick Start
//!
//! ```rust
//! use posting_core::PostingService;
//! use posting_core::utils::memory_storage::{
//!     MemoryAccountDirectory, MemoryPeriodCalendar, MemoryPublisher, MemoryStorage,
//! };
//!
//! // Wire the service against your own store, chart of accounts, period
//! // calendar, and event channel; the memory backends ship for tests.
//! let service = PostingService::new(
//!     MemoryStorage::new(),
//!     MemoryAccountDirectory::new(),
//!     MemoryPeriodCalendar::new(),
//!     MemoryPublisher::new(),
//! );
//! # let _ = service;
//! ```

pub mod events;
pub mod posting;
pub mod traits;
pub mod types;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use events::*;
pub use posting::*;
pub use traits::*;
pub use types::*;
pub use workflow::{
    ApprovalDecision, ApprovalEngine, ApprovalLevel, ApprovalRequest, ApprovalStore,
    ApprovalWorkflow, Decision, RequestStatus, WorkflowError, WorkflowResult,
};

// Re-export entry patterns for convenience
pub use posting::builder::patterns;
