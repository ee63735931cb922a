//! The opaque unit of work a job supervises.

use std::sync::Arc;

use crate::context::ExecutionContext;

/// How the work signaled completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Output was produced; the staged artifact is the job's result.
    Completed,
    /// The work declined to produce output without raising a fault.
    Aborted,
}

/// A generation task the execution unit schedules and supervises but does
/// not implement.
///
/// Implementations write output through [`ExecutionContext::staging`] and
/// may contribute progress through [`ExecutionContext::listener`]. Faults
/// of any kind, panics included, are contained by the execution unit.
pub trait Work: Send + Sync {
    fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<WorkOutcome>;
}

/// Re-resolves a work definition from its target path.
///
/// External resource-loading collaborator, used when deriving a job with a
/// replacement staging handler after the original definition may have gone
/// stale.
pub trait WorkLoader: Send + Sync {
    fn reload(&self, path: &str) -> anyhow::Result<Arc<dyn Work>>;
}
