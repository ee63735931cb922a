//! The execution principal captured at submission time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The principal a job executes under.
///
/// Captured when the job is constructed and immutable afterwards; the worker
/// re-establishes it for the duration of one run so the opaque work observes
/// the submitting user rather than the worker thread's ambient identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionIdentity {
    name: String,
    session_id: String,
}

impl ExecutionIdentity {
    pub fn new(name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session_id: session_id.into(),
        }
    }

    /// Principal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session id the principal was authenticated under.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

// Display carries the name only; session ids do not belong in log lines.
impl fmt::Display for ExecutionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
