//! Publish orchestration for crosspost.
//!
//! The orchestrator runs one item through a seven-step saga: load context,
//! validate credentials, resolve the publish target (with smart-retry
//! narrowing), generate and validate content, dispatch to each platform,
//! merge per-platform results by key, and persist the outcome. Partial
//! cross-platform success is a designed-for terminal state, not an error to
//! roll back.

mod error;
mod orchestrator;
mod preview;
mod saga;
mod validate;

pub use error::PublishError;
pub use orchestrator::{
    PublishOrchestrator, PublishOutcome, merge_results, resolve_target,
};
pub use preview::{ItemPreview, preview_campaign};
pub use saga::{CompensationFn, SagaLog};
pub use validate::{ValidationIssue, validate};
