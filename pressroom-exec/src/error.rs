//! Execution error types.

/// Errors surfaced around a job execution unit.
///
/// Only `ListenerMissing` escapes `run` itself; it signals a construction
/// bug, not a job failure. The remaining variants mirror a terminal status
/// for callers awaiting a submission handle.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// `run` was called before a status listener was attached.
    #[error("no status listener attached for job execution: {path}")]
    ListenerMissing { path: String },

    /// The job resolved to `Failed`.
    #[error("job failed: {}", .message.as_deref().unwrap_or("no detail"))]
    Failed { message: Option<String> },

    /// The job was canceled before completing.
    #[error("job was canceled")]
    Canceled,

    /// The worker pool tore the job down before it returned.
    #[error("worker task aborted: {0}")]
    Worker(String),
}
