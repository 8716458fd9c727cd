//! Audit logging for backup operations
//!
//! Every event the backup service emits is paired with an audit entry of
//! category `backup`. Sink failures never reach the caller of the backup
//! operation.
//!
//! # Architecture
//!
//! - `AuditEntry`: one entry with timestamp, action, outcome, owner and
//!   metadata copied from the paired event.
//! - `AuditSink`: where entries go. `AuditLogger` appends JSONL to a file;
//!   `MemoryAuditSink` keeps entries in memory; `TracingAuditSink` logs them.

mod entry;
mod logger;

pub use entry::{AuditAction, AuditCategory, AuditEntry, AuditOutcome};
pub use logger::{AuditLogger, AuditSink, MemoryAuditSink, TracingAuditSink};
