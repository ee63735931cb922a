//! Execution-context propagation.
//!
//! The context is passed to the work explicitly; a scoped thread-local
//! binding additionally supports ambient lookup from deep inside opaque
//! work that cannot thread the reference through. The binding lives for
//! exactly one `run` call on the invoking thread and is restored on drop,
//! including during unwinding.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use pressroom_core::{ExecutionIdentity, StatusListener};
use uuid::Uuid;

use crate::staging::{Staging, StagingError};

thread_local! {
    static CURRENT: RefCell<Option<Arc<ExecutionContext>>> = const { RefCell::new(None) };
}

/// Everything the opaque work may observe about the job driving it.
pub struct ExecutionContext {
    identity: ExecutionIdentity,
    listener: Arc<StatusListener>,
    correlation_id: Uuid,
    staging: Arc<dyn Staging>,
}

impl ExecutionContext {
    pub fn new(
        identity: ExecutionIdentity,
        listener: Arc<StatusListener>,
        correlation_id: Uuid,
        staging: Arc<dyn Staging>,
    ) -> Self {
        Self {
            identity,
            listener,
            correlation_id,
            staging,
        }
    }

    /// The principal this run executes under.
    pub fn identity(&self) -> &ExecutionIdentity {
        &self.identity
    }

    /// The listener pollers observe; the work may contribute progress here.
    pub fn listener(&self) -> &StatusListener {
        &self.listener
    }

    /// Correlation id shared with the job's audit events.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// The staging handler for this run.
    pub fn staging(&self) -> &dyn Staging {
        self.staging.as_ref()
    }

    /// Append rendered output to the staging sink.
    pub fn write_output(&self, buf: &[u8]) -> Result<(), StagingError> {
        self.staging.write(buf)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("identity", &self.identity)
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

/// Scoped binding of the thread's current execution context.
///
/// Installs the context on construction and restores the previous binding
/// on drop. Drop runs during unwinding, so the binding cannot leak past a
/// panicking run.
pub struct ContextScope {
    previous: Option<Arc<ExecutionContext>>,
}

impl ContextScope {
    pub fn enter(ctx: Arc<ExecutionContext>) -> Self {
        let previous = CURRENT.with(|current| current.replace(Some(ctx)));
        Self { previous }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CURRENT.with(|current| {
            *current.borrow_mut() = self.previous.take();
        });
    }
}

/// The context bound to this thread by the currently running job, if any.
pub fn current() -> Option<Arc<ExecutionContext>> {
    CURRENT.with(|current| current.borrow().clone())
}
