//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in campaign-level scheduler bookkeeping.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] crosspost_store::StoreError),

    /// Publish error.
    #[error("publish error: {0}")]
    Publish(#[from] crosspost_publish::PublishError),
}
