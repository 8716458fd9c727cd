//! Domain events emitted by the backup service

use serde::{Deserialize, Serialize};

use crate::models::{BackupId, DatasetKind};

pub const TOPIC_COMPLETED: &str = "backup.completed";
pub const TOPIC_FAILED: &str = "backup.failed";
pub const TOPIC_RETENTION_APPLIED: &str = "backup.retention-applied";
pub const TOPIC_FAILURE_ALERT: &str = "backup.failure-alert";

/// Subscribing to this topic receives every event
pub const TOPIC_ALL: &str = "*";

/// Something that happened to an owner's backup history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackupEvent {
    /// A backup was written, or an existing one was read back
    #[serde(rename = "backup.completed", rename_all = "camelCase")]
    Completed {
        dataset: DatasetKind,
        owner_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backup_id: Option<BackupId>,
        retained: usize,
        pruned: usize,
    },

    /// A backup could not be written or found
    #[serde(rename = "backup.failed", rename_all = "camelCase")]
    Failed {
        dataset: DatasetKind,
        owner_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backup_id: Option<BackupId>,
        error: String,
        consecutive_failures: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// The retention rule dropped old backups
    #[serde(rename = "backup.retention-applied", rename_all = "camelCase")]
    RetentionApplied {
        dataset: DatasetKind,
        owner_id: String,
        pruned: usize,
        retained: usize,
    },

    /// Consecutive failures reached the alert threshold
    #[serde(rename = "backup.failure-alert", rename_all = "camelCase")]
    FailureAlert {
        dataset: DatasetKind,
        owner_id: String,
        error: String,
        consecutive_failures: u32,
    },
}

impl BackupEvent {
    /// Topic this event is published on
    pub fn topic(&self) -> &'static str {
        match self {
            BackupEvent::Completed { .. } => TOPIC_COMPLETED,
            BackupEvent::Failed { .. } => TOPIC_FAILED,
            BackupEvent::RetentionApplied { .. } => TOPIC_RETENTION_APPLIED,
            BackupEvent::FailureAlert { .. } => TOPIC_FAILURE_ALERT,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            BackupEvent::Completed { owner_id, .. }
            | BackupEvent::Failed { owner_id, .. }
            | BackupEvent::RetentionApplied { owner_id, .. }
            | BackupEvent::FailureAlert { owner_id, .. } => owner_id,
        }
    }

    /// Event fields as a JSON object, without the `type` tag
    pub fn metadata(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(fields) = &mut value {
            fields.remove("type");
        }
        value
    }
}
