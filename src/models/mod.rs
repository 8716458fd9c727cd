//! Core data models for the backup store
//!
//! Records, their summaries, retention rules, and per-owner failure state.

pub mod failure;
pub mod ids;
pub mod record;
pub mod retention;

pub use failure::{level_of, FailureLevel, FailureState, DEFAULT_ALERT_THRESHOLD};
pub use ids::BackupId;
pub use record::{
    completion_percentage, normalize_timestamp, BackupRecord, BackupSummary, SummaryMetrics,
    LEGACY_RECORD_FORMAT_VERSION, RECORD_FORMAT_VERSION,
};
pub use retention::{DatasetKind, RetentionRule, MAX_AGE_DAYS_LIMIT};
