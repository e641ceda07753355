//! Posting module containing the batch orchestrator and entry construction

pub mod builder;
pub mod service;

pub use builder::*;
pub use service::*;
