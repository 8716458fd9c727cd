//! Retention engine
//!
//! Decides which of an owner's records survive a retention rule. Pure: it
//! neither reads the clock nor touches storage.

use chrono::{DateTime, Utc};

use crate::models::{BackupRecord, RetentionRule};

/// Result of a retention pass
#[derive(Debug, Clone, Default)]
pub struct RetentionOutcome {
    /// Surviving records, newest first, with `retention_expires_at` refreshed
    pub kept: Vec<BackupRecord>,
    /// Records dropped by the count cap or the age cap, newest first
    pub pruned: Vec<BackupRecord>,
}

/// Apply `rule` to `records` as of `now`
///
/// Records are ordered by timestamp, newest first (ties keep their input
/// order). A record is kept while fewer than `max_entries` have been kept
/// and, when the rule has an age cap, it is no older than `max_age_days`.
pub fn apply_retention(
    mut records: Vec<BackupRecord>,
    rule: &RetentionRule,
    now: DateTime<Utc>,
) -> RetentionOutcome {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let max_age = rule.max_age();
    let mut outcome = RetentionOutcome::default();

    for mut record in records {
        let under_cap = outcome.kept.len() < rule.max_entries;
        let fresh_enough = max_age.map_or(true, |age| now - record.timestamp <= age);

        if under_cap && fresh_enough {
            record.retention_expires_at = rule.expires_at(record.timestamp);
            outcome.kept.push(record);
        } else {
            outcome.pruned.push(record);
        }
    }

    outcome
}
