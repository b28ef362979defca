//! Error types for publish orchestration.

use thiserror::Error;

use crosspost_platform::PlatformError;
use crosspost_store::StoreError;

use crate::validate::ValidationIssue;

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while publishing one item.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Missing or expired credentials. Terminal for the attempt and excluded
    /// from smart retry: fixing it requires re-authentication.
    #[error("credential error: {0}")]
    Credential(String),

    /// The compatibility validator rejected the content. The attempt aborts
    /// before any network call.
    #[error("content validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Platform capability error outside per-platform dispatch (dispatch
    /// failures are recorded as per-platform results, not raised).
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}
