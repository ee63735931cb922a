//! # Pressroom Exec
//!
//! The asynchronous job execution unit for the pressroom render system.
//!
//! A [`JobExecution`] wraps one long-running, opaque generation task so a
//! caller can submit it to a worker pool, poll its status from another
//! thread through the shared [`StatusListener`], and retrieve the staged
//! output once it finishes. The unit guarantees that:
//!
//! - a terminal status is written on every exit path, including panics in
//!   the work or in the unit's own setup;
//! - the staging write sink is closed regardless of how execution ends;
//! - the captured execution identity is in scope for the duration of the
//!   work and cleared afterwards.
//!
//! [`StatusListener`]: pressroom_core::StatusListener

pub mod audit_log;
pub mod context;
pub mod error;
pub mod executor;
pub mod job;
pub mod staging;
pub mod work;

pub use audit_log::LogAuditSink;
pub use context::{current, ContextScope, ExecutionContext};
pub use error::ExecError;
pub use executor::{submit, JobHandle};
pub use job::JobExecution;
pub use staging::{FileStaging, MemoryStaging, StagedContent, Staging, StagingError};
pub use work::{Work, WorkLoader, WorkOutcome};
