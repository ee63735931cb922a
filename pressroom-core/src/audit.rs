//! Audit records emitted around each job run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::ExecutionIdentity;

/// Kind of lifecycle event being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Work began executing.
    InstanceStart,
    /// Work finished and produced its output.
    InstanceEnd,
    /// Work failed or declined to produce output.
    InstanceFailed,
}

/// One audit event around a job run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the event occurred.
    pub ts: DateTime<Utc>,

    /// Session id of the identity the job ran under.
    pub session_id: String,

    /// Principal name.
    pub actor: String,

    /// Target path of the work.
    pub path: String,

    /// Component that emitted the event.
    pub source: String,

    /// What happened.
    pub event: AuditEventType,

    /// Correlation id; equals the job's audit id across all of its events.
    pub correlation_id: Uuid,

    /// Free-form detail, empty for plain lifecycle events.
    pub detail: String,

    /// Wall-clock duration in fractional seconds; zero for start events.
    pub elapsed_seconds: f64,

    /// Additional contextual information.
    /// Using BTreeMap for deterministic serialization order.
    pub extra: BTreeMap<String, String>,
}

impl AuditRecord {
    /// Lifecycle event for one job run, stamped with the current time.
    pub fn lifecycle(
        identity: &ExecutionIdentity,
        path: impl Into<String>,
        source: impl Into<String>,
        event: AuditEventType,
        correlation_id: Uuid,
        elapsed_seconds: f64,
    ) -> Self {
        Self {
            ts: Utc::now(),
            session_id: identity.session_id().to_string(),
            actor: identity.name().to_string(),
            path: path.into(),
            source: source.into(),
            event,
            correlation_id,
            detail: String::new(),
            elapsed_seconds,
            extra: BTreeMap::new(),
        }
    }

    /// Attach free-form detail (builder pattern).
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Attach contextual metadata (builder pattern).
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Sink for audit records.
///
/// Fire-and-forget from the execution unit's perspective: implementations
/// own their error handling, and a sink failure is never a job failure.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Sink that drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}
