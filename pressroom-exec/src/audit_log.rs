//! Audit sink backed by the tracing subscriber.

use pressroom_core::{AuditRecord, AuditSink};

/// Sink that forwards every record to the tracing subscriber.
///
/// Suits deployments where the audit trail rides the structured log stream;
/// durable sinks live behind the same trait in outer layers.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, record: &AuditRecord) {
        tracing::info!(
            target: "pressroom::audit",
            event = ?record.event,
            actor = %record.actor,
            path = %record.path,
            correlation_id = %record.correlation_id,
            elapsed_seconds = record.elapsed_seconds,
            "audit"
        );
    }
}

#[cfg(test)]
mod tests {
    use pressroom_core::{AuditEventType, ExecutionIdentity};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn record_is_fire_and_forget() {
        // No subscriber installed; recording must still be a no-op success.
        LogAuditSink.record(&AuditRecord::lifecycle(
            &ExecutionIdentity::new("suzy", "session-1"),
            "/reports/a.prpt",
            "test",
            AuditEventType::InstanceStart,
            Uuid::new_v4(),
            0.0,
        ));
    }
}
