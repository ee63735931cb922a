//! The job execution unit.
//!
//! Runs one opaque generation task under the captured identity, drives the
//! status state machine, and guarantees staging cleanup and a terminal
//! status on every exit path. Pay attention: the caller observes completion
//! exclusively through the status field, so if execution could return with
//! the status stuck at `Working`, the job would appear to hang forever to
//! any poller.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use pressroom_core::audit::{AuditEventType, AuditRecord, AuditSink};
use pressroom_core::{ExecutionIdentity, JobState, JobStatus, StatusListener};
use uuid::Uuid;

use crate::context::{ContextScope, ExecutionContext};
use crate::error::ExecError;
use crate::staging::{StagedContent, Staging};
use crate::work::{Work, WorkLoader, WorkOutcome};

/// A single-invocation execution unit for one render job.
///
/// Constructed at submission time with the captured identity and a staging
/// handler, then handed to a worker pool which invokes [`run`](Self::run)
/// exactly once. Pollers observe progress through the attached
/// [`StatusListener`].
pub struct JobExecution {
    path: String,
    work: Arc<dyn Work>,
    staging: Arc<dyn Staging>,
    identity: ExecutionIdentity,
    audit_id: Uuid,
    audit: Arc<dyn AuditSink>,
    listener: OnceLock<Arc<StatusListener>>,
}

impl JobExecution {
    pub fn new(
        path: impl Into<String>,
        work: Arc<dyn Work>,
        staging: Arc<dyn Staging>,
        identity: ExecutionIdentity,
        audit_id: Uuid,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            path: path.into(),
            work,
            staging,
            identity,
            audit_id,
            audit,
            listener: OnceLock::new(),
        }
    }

    /// Attach the status listener pollers will observe.
    ///
    /// Must happen before [`run`](Self::run). A second attach keeps the
    /// first binding.
    pub fn attach_listener(&self, listener: Arc<StatusListener>) {
        let _ = self.listener.set(listener);
    }

    pub fn listener(&self) -> Option<&Arc<StatusListener>> {
        self.listener.get()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn audit_id(&self) -> Uuid {
        self.audit_id
    }

    pub fn identity(&self) -> &ExecutionIdentity {
        &self.identity
    }

    /// Snapshot of the job's observable state.
    pub fn state(&self) -> Result<JobState, ExecError> {
        self.listener
            .get()
            .map(|listener| listener.state())
            .ok_or_else(|| ExecError::ListenerMissing {
                path: self.path.clone(),
            })
    }

    /// Build a new unit sharing this one's identity and correlation id but
    /// writing through a replacement staging handler.
    ///
    /// The work definition is re-resolved from the target path; a failed
    /// lookup is non-fatal and the existing definition is kept. The derived
    /// unit has no listener attached and starts from `Queued` regardless of
    /// this unit's terminal status.
    pub fn derive_with_staging(
        &self,
        staging: Arc<dyn Staging>,
        loader: &dyn WorkLoader,
    ) -> JobExecution {
        let work = match loader.reload(&self.path) {
            Ok(work) => work,
            Err(error) => {
                tracing::error!(
                    path = %self.path,
                    error = %error,
                    "work definition lookup failed, keeping original"
                );
                Arc::clone(&self.work)
            }
        };

        JobExecution {
            path: self.path.clone(),
            work,
            staging,
            identity: self.identity.clone(),
            audit_id: self.audit_id,
            audit: Arc::clone(&self.audit),
            listener: OnceLock::new(),
        }
    }

    /// Execute the work once.
    ///
    /// Returns the staged content on success, `None` when the job resolved
    /// to a terminal failure, and `Err` only for the listener-missing
    /// precondition violation. No unwinding escapes this call: panics in
    /// the work, and even in the unit's own setup, are contained after the
    /// terminal status has been written and the staging sink closed.
    pub fn run(&self) -> Result<Option<StagedContent>, ExecError> {
        let listener = self
            .listener
            .get()
            .cloned()
            .ok_or_else(|| ExecError::ListenerMissing {
                path: self.path.clone(),
            })?;

        match panic::catch_unwind(AssertUnwindSafe(|| self.run_supervised(&listener))) {
            Ok(content) => Ok(content),
            Err(_payload) => {
                // Guards inside the supervised body already resolved the
                // terminal status and closed the sink.
                tracing::error!(job = %self, "execution faulted outside the work call");
                Ok(None)
            }
        }
    }

    fn run_supervised(&self, listener: &Arc<StatusListener>) -> Option<StagedContent> {
        let _span =
            tracing::info_span!("job_run", path = %self.path, audit_id = %self.audit_id).entered();

        // Drop order is the reverse of declaration: the context scope is
        // cleared first, then the terminal status is ensured, then the sink
        // is closed.
        let _sink = SinkGuard {
            staging: Arc::clone(&self.staging),
        };
        let _terminal = TerminalGuard {
            listener: Arc::clone(listener),
        };

        let ctx = Arc::new(ExecutionContext::new(
            self.identity.clone(),
            Arc::clone(listener),
            self.audit_id,
            Arc::clone(&self.staging),
        ));
        let _scope = ContextScope::enter(Arc::clone(&ctx));

        // Visible to pollers before the work begins.
        listener.set_status(JobStatus::Working);

        let started = Instant::now();
        self.audit
            .record(&self.record(AuditEventType::InstanceStart, 0.0));

        match panic::catch_unwind(AssertUnwindSafe(|| self.work.execute(&ctx))) {
            Ok(Ok(WorkOutcome::Completed)) => {
                self.audit.record(&self.record(
                    AuditEventType::InstanceEnd,
                    started.elapsed().as_secs_f64(),
                ));

                match self.staging.content() {
                    Ok(content) => {
                        listener.set_status(JobStatus::Finished);
                        Some(content)
                    }
                    Err(error) => {
                        tracing::error!(
                            job = %self,
                            error = %error,
                            "staged content unavailable after render"
                        );
                        listener.set_error_message(chain_messages(
                            anyhow::Error::new(error).chain(),
                        ));
                        self.fail(listener);
                        None
                    }
                }
            }
            Ok(Ok(WorkOutcome::Aborted)) => {
                // The work declined without a fault: terminal status only,
                // no diagnostic.
                self.fail(listener);
                None
            }
            Ok(Err(error)) => {
                tracing::error!(job = %self, error = %error, "render work raised");
                let message = chain_messages(error.chain());
                if !message.is_empty() {
                    listener.set_error_message(message);
                }
                self.fail(listener);
                None
            }
            Err(payload) => {
                let message = panic_text(payload.as_ref());
                tracing::error!(
                    job = %self,
                    payload = message.as_deref().unwrap_or("<non-string payload>"),
                    "render work panicked"
                );
                if let Some(text) = message {
                    let text = text.trim();
                    if !text.is_empty() {
                        listener.set_error_message(format!("{text}.\n"));
                    }
                }
                self.fail(listener);
                None
            }
        }
    }

    /// Resolve to `Failed`. An externally set `Canceled` takes precedence
    /// in the listener.
    fn fail(&self, listener: &StatusListener) {
        self.audit
            .record(&self.record(AuditEventType::InstanceFailed, 0.0));
        listener.set_status(JobStatus::Failed);
    }

    fn record(&self, event: AuditEventType, elapsed_seconds: f64) -> AuditRecord {
        AuditRecord::lifecycle(
            &self.identity,
            &self.path,
            module_path!(),
            event,
            self.audit_id,
            elapsed_seconds,
        )
    }
}

// Human-readable identity for logging; never includes the session id.
impl fmt::Display for JobExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JobExecution{{path='{}', audit_id='{}'}}",
            self.path, self.audit_id
        )
    }
}

impl fmt::Debug for JobExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobExecution")
            .field("path", &self.path)
            .field("audit_id", &self.audit_id)
            .field("actor", &self.identity.name())
            .finish()
    }
}

/// Closes the staging sink on drop. A close failure is logged, never
/// escalated: the terminal status is already decided by then.
struct SinkGuard {
    staging: Arc<dyn Staging>,
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if let Err(error) = self.staging.close() {
            tracing::error!(error = %error, "failed to close staging sink");
        }
    }
}

/// Writes `Failed` on drop unless a terminal status was already reached.
struct TerminalGuard {
    listener: Arc<StatusListener>,
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if !self.listener.status().is_terminal() {
            self.listener.set_status(JobStatus::Failed);
        }
    }
}

/// Join each level of a fault's cause chain, outermost first, terminating
/// every message with a period and newline. Blank levels are skipped, so a
/// message-less cause never produces an empty segment.
fn chain_messages<'a>(
    chain: impl Iterator<Item = &'a (dyn std::error::Error + 'static)>,
) -> String {
    let mut message = String::new();
    for cause in chain {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        message.push_str(trimmed);
        message.push_str(".\n");
    }
    message
}

/// Best-effort text from a panic payload.
fn panic_text(payload: &(dyn Any + Send)) -> Option<String> {
    if let Some(text) = payload.downcast_ref::<&str>() {
        Some((*text).to_string())
    } else {
        payload.downcast_ref::<String>().cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================
