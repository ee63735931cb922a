//! Job lifecycle status and the shared status listener.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued but not yet started.
    Queued,
    /// Job is currently executing on a worker.
    Working,
    /// Job completed and its staged output is available.
    Finished,
    /// Job failed, either a clean refusal by the work or a contained fault.
    Failed,
    /// Job was canceled by an external actor.
    Canceled,
}

impl JobStatus {
    /// Returns true if no further transitions are permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Canceled)
    }

    /// Position in the Queued → Working → terminal ordering.
    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Working => 1,
            Self::Finished | Self::Failed | Self::Canceled => 2,
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Progress metadata contributed by the running work.
///
/// An overlay on `JobStatus::Working`; updating it never changes the
/// lifecycle status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobProgress {
    /// Percent complete (0.0 - 100.0), if the work reports it.
    pub percent: Option<f64>,
    /// Human-readable description of the current activity.
    pub activity: Option<String>,
}

// ============================================================================
// State Snapshot
// ============================================================================

/// Read-only snapshot of a job's observable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    /// Target path the job renders.
    pub path: String,
    /// Correlation id shared with the job's audit events.
    pub audit_id: Uuid,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Diagnostic detail, present only when the job failed with one.
    pub error_message: Option<String>,
    /// Latest externally contributed progress.
    pub progress: JobProgress,
}

// ============================================================================
// Status Listener
// ============================================================================

struct ListenerInner {
    status: JobStatus,
    error_message: Option<String>,
    progress: JobProgress,
}

/// Thread-safe holder of a job's current status, shared between the
/// executing unit (the single lifecycle writer) and any number of pollers.
///
/// Writes are visible to readers without external locking. Once a terminal
/// status is set, further status writes are ignored; an externally set
/// `Canceled` therefore survives the executing unit's own terminal write.
pub struct StatusListener {
    path: String,
    audit_id: Uuid,
    inner: RwLock<ListenerInner>,
}

impl StatusListener {
    /// New listener for a job targeting `path`, starting at `Queued`.
    pub fn new(path: impl Into<String>, audit_id: Uuid) -> Self {
        Self {
            path: path.into(),
            audit_id,
            inner: RwLock::new(ListenerInner {
                status: JobStatus::Queued,
                error_message: None,
                progress: JobProgress::default(),
            }),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn audit_id(&self) -> Uuid {
        self.audit_id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> JobStatus {
        self.read().status
    }

    /// Transition to `next`. Returns whether the write was applied.
    ///
    /// Writes after a terminal status are ignored. Ordering within the
    /// non-terminal states is the caller's responsibility; applied writes
    /// are asserted monotonic in debug builds.
    pub fn set_status(&self, next: JobStatus) -> bool {
        let mut inner = self.write();
        if inner.status.is_terminal() {
            return false;
        }
        debug_assert!(
            next.rank() >= inner.status.rank(),
            "status must not move backwards: {:?} -> {:?}",
            inner.status,
            next,
        );
        inner.status = next;
        true
    }

    /// Attach the diagnostic detail for a failing job. Set at most once,
    /// and only while the job has not already reached a terminal status;
    /// later calls are ignored.
    pub fn set_error_message(&self, message: impl Into<String>) {
        let mut inner = self.write();
        if inner.error_message.is_none() && !inner.status.is_terminal() {
            inner.error_message = Some(message.into());
        }
    }

    /// Record progress contributed by the running work. Never touches the
    /// lifecycle status.
    pub fn update_progress(&self, progress: JobProgress) {
        self.write().progress = progress;
    }

    /// Snapshot of the full observable state.
    pub fn state(&self) -> JobState {
        let inner = self.read();
        JobState {
            path: self.path.clone(),
            audit_id: self.audit_id,
            status: inner.status,
            error_message: inner.error_message.clone(),
            progress: inner.progress.clone(),
        }
    }

    // A panicking writer elsewhere must not wedge pollers, so lock poisoning
    // is recovered rather than propagated.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, ListenerInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ListenerInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for StatusListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusListener")
            .field("path", &self.path)
            .field("audit_id", &self.audit_id)
            .field("status", &self.status())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn listener() -> StatusListener {
        StatusListener::new("/reports/quarterly.prpt", Uuid::new_v4())
    }

    // ── Lifecycle Transitions ─────────────────────────────────────────────

    #[test]
    fn queued_to_working_to_finished() {
        let listener = listener();
        assert_eq!(listener.status(), JobStatus::Queued);
        assert!(listener.set_status(JobStatus::Working));
        assert_eq!(listener.status(), JobStatus::Working);
        assert!(listener.set_status(JobStatus::Finished));
        assert_eq!(listener.status(), JobStatus::Finished);
    }

    #[test]
    fn terminal_status_is_sticky() {
        let listener = listener();
        listener.set_status(JobStatus::Working);
        listener.set_status(JobStatus::Finished);

        assert!(!listener.set_status(JobStatus::Failed));
        assert_eq!(listener.status(), JobStatus::Finished);
    }

    #[test]
    fn external_cancel_survives_terminal_write() {
        let listener = listener();
        listener.set_status(JobStatus::Working);
        // External actor cancels while the unit is still running.
        assert!(listener.set_status(JobStatus::Canceled));

        // The unit's own terminal write is ignored.
        assert!(!listener.set_status(JobStatus::Failed));
        assert_eq!(listener.status(), JobStatus::Canceled);
    }

    #[test]
    fn error_message_set_at_most_once() {
        let listener = listener();
        listener.set_error_message("first");
        listener.set_error_message("second");
        assert_eq!(listener.state().error_message.as_deref(), Some("first"));
    }

    #[test]
    fn error_message_not_attached_after_terminal() {
        let listener = listener();
        listener.set_status(JobStatus::Working);
        listener.set_status(JobStatus::Canceled);
        listener.set_error_message("too late");
        assert_eq!(listener.state().error_message, None);
    }

    #[test]
    fn progress_update_does_not_touch_status() {
        let listener = listener();
        listener.set_status(JobStatus::Working);
        listener.update_progress(JobProgress {
            percent: Some(42.0),
            activity: Some("paginating".to_string()),
        });

        let state = listener.state();
        assert_eq!(state.status, JobStatus::Working);
        assert_eq!(state.progress.percent, Some(42.0));
        assert_eq!(state.progress.activity.as_deref(), Some("paginating"));
    }

    #[test]
    fn state_snapshot_carries_identity_fields() {
        let audit_id = Uuid::new_v4();
        let listener = StatusListener::new("/reports/inventory.prpt", audit_id);
        let state = listener.state();
        assert_eq!(state.path, "/reports/inventory.prpt");
        assert_eq!(state.audit_id, audit_id);
        assert_eq!(state.status, JobStatus::Queued);
        assert_eq!(state.error_message, None);
    }

    // ── Concurrency ───────────────────────────────────────────────────────

    #[test]
    fn writes_visible_across_threads() {
        let listener = Arc::new(listener());
        let writer = Arc::clone(&listener);

        let handle = std::thread::spawn(move || {
            writer.set_status(JobStatus::Working);
            writer.set_status(JobStatus::Finished);
        });
        handle.join().unwrap();

        assert_eq!(listener.status(), JobStatus::Finished);
    }

    // ── Serialization ─────────────────────────────────────────────────────

    #[test]
    fn status_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Queued).unwrap(),
            r#""queued""#
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Working).unwrap(),
            r#""working""#
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Finished).unwrap(),
            r#""finished""#
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Failed).unwrap(),
            r#""failed""#
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Canceled).unwrap(),
            r#""canceled""#
        );
    }

    #[test]
    fn job_state_roundtrip() {
        let listener = listener();
        listener.set_status(JobStatus::Working);
        listener.update_progress(JobProgress {
            percent: Some(10.0),
            activity: None,
        });

        let state = listener.state();
        let json = serde_json::to_string(&state).unwrap();
        let parsed: JobState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn terminal_covers_exactly_three_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Working.is_terminal());
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }
}
