//! Submission glue: dispatch job executions onto a worker pool.
//!
//! Scheduling policy across jobs belongs to the pool, not to this crate;
//! this module only bridges a [`JobExecution`] onto the tokio blocking pool
//! and hands back a handle for polling, cancellation, and retrieval.

use std::sync::Arc;

use pressroom_core::{JobState, JobStatus, StatusListener};

use crate::error::ExecError;
use crate::job::JobExecution;
use crate::staging::StagedContent;

/// Handle to a submitted job: poll state, cancel, or await the result.
pub struct JobHandle {
    listener: Arc<StatusListener>,
    join: tokio::task::JoinHandle<Result<Option<StagedContent>, ExecError>>,
}

/// Submit a job to the runtime's blocking pool.
///
/// Attaches a fresh status listener (or reuses one already attached) and
/// runs the unit on a worker thread. `run` blocks that thread for the full
/// duration of the work, so jobs go through the blocking pool rather than
/// an async task.
pub fn submit(job: JobExecution) -> JobHandle {
    let listener = match job.listener() {
        Some(listener) => Arc::clone(listener),
        None => {
            let listener = Arc::new(StatusListener::new(job.path(), job.audit_id()));
            job.attach_listener(Arc::clone(&listener));
            listener
        }
    };

    let join = tokio::task::spawn_blocking(move || job.run());
    JobHandle { listener, join }
}

impl JobHandle {
    /// The listener shared with the running unit.
    pub fn listener(&self) -> &Arc<StatusListener> {
        &self.listener
    }

    /// Poll the job's observable state.
    pub fn state(&self) -> JobState {
        self.listener.state()
    }

    /// Mark the job `Canceled`. Returns whether the write was applied.
    ///
    /// In-flight work is not interrupted here; interrupting the worker is
    /// the pool's concern. Once applied, the unit's own terminal write is
    /// ignored.
    pub fn cancel(&self) -> bool {
        self.listener.set_status(JobStatus::Canceled)
    }

    /// Await completion, resolving to the staged artifact or the failure
    /// mirrored from the terminal status.
    pub async fn wait(self) -> Result<StagedContent, ExecError> {
        let outcome = self
            .join
            .await
            .map_err(|error| ExecError::Worker(error.to_string()))?;

        match outcome? {
            Some(content) => Ok(content),
            None => {
                let state = self.listener.state();
                if state.status == JobStatus::Canceled {
                    Err(ExecError::Canceled)
                } else {
                    Err(ExecError::Failed {
                        message: state.error_message,
                    })
                }
            }
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("path", &self.listener.path())
            .field("audit_id", &self.listener.audit_id())
            .field("status", &self.listener.status())
            .finish()
    }
}
