//! Backup identifiers
//!
//! Current backups carry a random UUID. Backups written under the legacy
//! one-key-per-backup scheme carry their decimal sequence number instead,
//! so the wrapper holds an opaque string and exposes the legacy form on
//! demand.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a single backup record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(String);

impl BackupId {
    /// Generate a new random ID
    ///
    /// Collisions are not checked for.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier supplied by a caller or read from storage
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// ID of a backup migrated from the legacy scheme
    pub fn from_legacy_sequence(sequence: u64) -> Self {
        Self(sequence.to_string())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The legacy sequence number, if this ID is a non-negative integer
    pub fn legacy_sequence(&self) -> Option<u64> {
        let trimmed = self.0.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        trimmed.parse().ok()
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackupId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}
