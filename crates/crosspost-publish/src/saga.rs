//! Saga step log with selective compensation.
//!
//! An orchestration run records each completed step as it goes, optionally
//! attaching a compensation. When a later step fails, compensations for the
//! already-completed steps run in reverse order. Steps are free to register
//! no compensation; the dispatch step does this deliberately, because a
//! successful remote post is never rolled back.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

/// A deferred compensation action for one completed step.
pub type CompensationFn = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Ordered log of completed saga steps.
pub struct SagaLog {
    completed: Vec<(&'static str, Option<CompensationFn>)>,
}

impl SagaLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            completed: Vec::new(),
        }
    }

    /// Record a completed step with no compensation.
    pub fn record(&mut self, step: &'static str) {
        debug!(step, "saga step completed");
        self.completed.push((step, None));
    }

    /// Record a completed step with a compensation to run if a later step
    /// fails.
    pub fn record_with_compensation(&mut self, step: &'static str, compensation: CompensationFn) {
        debug!(step, "saga step completed (compensable)");
        self.completed.push((step, Some(compensation)));
    }

    /// Names of the completed steps, in execution order.
    pub fn completed_steps(&self) -> Vec<&'static str> {
        self.completed.iter().map(|(name, _)| *name).collect()
    }

    /// Run all registered compensations in reverse execution order,
    /// consuming the log.
    pub async fn compensate(self) {
        for (step, compensation) in self.completed.into_iter().rev() {
            if let Some(compensation) = compensation {
                warn!(step, "running compensation");
                compensation().await;
            }
        }
    }
}

impl Default for SagaLog {
    fn default() -> Self {
        Self::new()
    }
}
