//! Audit entry data structures
//!
//! Defines the structure of audit log entries: category, action, outcome,
//! and the metadata copied from the paired event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Area of the application an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    Backup,
}

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    /// A backup was taken (or taking one failed)
    Create,
    /// A backup was read back (or could not be found)
    Restore,
    /// Old backups were dropped by the retention rule
    RetentionPrune,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Create => write!(f, "CREATE"),
            AuditAction::Restore => write!(f, "RESTORE"),
            AuditAction::RetentionPrune => write!(f, "RETENTION-PRUNE"),
        }
    }
}

/// Whether the audited operation succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    pub category: AuditCategory,

    pub action: AuditAction,

    pub outcome: AuditOutcome,

    /// Owner whose backup history was touched
    pub owner_id: String,

    /// Backup affected, when there is a single one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,

    /// Key fields of the paired event
    #[serde(default)]
    pub metadata: Value,
}

impl AuditEntry {
    /// Entry for a successful operation
    pub fn success(
        action: AuditAction,
        owner_id: impl Into<String>,
        backup_id: Option<String>,
        metadata: Value,
    ) -> Self {
        Self::new(action, AuditOutcome::Success, owner_id, backup_id, metadata)
    }

    /// Entry for a failed operation
    pub fn failure(
        action: AuditAction,
        owner_id: impl Into<String>,
        backup_id: Option<String>,
        metadata: Value,
    ) -> Self {
        Self::new(action, AuditOutcome::Failure, owner_id, backup_id, metadata)
    }

    fn new(
        action: AuditAction,
        outcome: AuditOutcome,
        owner_id: impl Into<String>,
        backup_id: Option<String>,
        metadata: Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category: AuditCategory::Backup,
            action,
            outcome,
            owner_id: owner_id.into(),
            backup_id,
            metadata,
        }
    }

    /// Restamp the entry with `timestamp`
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} owner={}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.action,
            match self.outcome {
                AuditOutcome::Success => "ok",
                AuditOutcome::Failure => "FAILED",
            },
            self.owner_id
        );

        if let Some(id) = &self.backup_id {
            output.push_str(&format!(" backup={}", id));
        }

        if let Value::Object(fields) = &self.metadata {
            let details: Vec<String> = fields
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "ownerId" | "backupId"))
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            if !details.is_empty() {
                output.push_str(&format!("\n  {}", details.join(", ")));
            }
        }

        output
    }
}
