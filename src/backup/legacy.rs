//! Legacy storage compatibility
//!
//! Before the bounded per-owner store, every backup lived under its own key
//! `tender-backup:{owner}:{sequence}` and a single unbounded index array
//! cross-referenced them. The migrator reads that layout and never writes
//! it; legacy keys are only deleted for records the retention engine has
//! just pruned.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{
    completion_percentage, normalize_timestamp, BackupId, BackupRecord, DatasetKind,
    SummaryMetrics, LEGACY_RECORD_FORMAT_VERSION,
};
use crate::storage::KeyValueStore;

/// Prefix of per-backup keys under the legacy scheme
pub const LEGACY_KEY_PREFIX: &str = "tender-backup";

/// Key of the legacy snapshot for `(owner, sequence)`
pub fn legacy_key(owner_id: &str, sequence: u64) -> String {
    format!("{}:{}:{}", LEGACY_KEY_PREFIX, owner_id, sequence)
}

/// One element of the legacy index array
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyIndexEntry {
    id: u64,
    #[serde(alias = "tenderId")]
    owner_id: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    items_total: Option<u64>,
    #[serde(default)]
    items_priced: Option<u64>,
    #[serde(default)]
    completion_percentage: Option<f64>,
    #[serde(default)]
    total_value: Option<f64>,
}

/// Reads backups written under the legacy one-key-per-backup scheme
#[derive(Clone)]
pub struct LegacyMigrator {
    kv: Arc<dyn KeyValueStore>,
}

impl LegacyMigrator {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Whether a persisted blob has the legacy index shape
    ///
    /// Accepts a bare array or an object wrapping it as `index`.
    pub fn legacy_index(blob: &Value) -> Option<&Vec<Value>> {
        match blob {
            Value::Array(entries) => Some(entries),
            Value::Object(fields) if !fields.contains_key("owners") => {
                fields.get("index").and_then(Value::as_array)
            }
            _ => None,
        }
    }

    /// Read the legacy snapshot for `backup_id`, returned exactly as stored
    ///
    /// Only IDs that parse as a non-negative integer have a legacy key.
    pub async fn read_snapshot(&self, owner_id: &str, backup_id: &BackupId) -> Option<Value> {
        let sequence = backup_id.legacy_sequence()?;
        let key = legacy_key(owner_id, sequence);

        let raw = match self.kv.load(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "legacy snapshot read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(key = %key, error = %e, "legacy snapshot is not valid JSON");
                None
            }
        }
    }

    /// Build per-owner records from a legacy index
    ///
    /// Entries that don't parse, or whose snapshot key is missing, are
    /// skipped. The result is unbounded; callers apply retention.
    pub async fn migrate_index(
        &self,
        entries: &[Value],
        now: DateTime<Utc>,
    ) -> BTreeMap<String, Vec<BackupRecord>> {
        let mut owners: BTreeMap<String, Vec<BackupRecord>> = BTreeMap::new();

        for raw in entries {
            let entry: LegacyIndexEntry = match serde_json::from_value(raw.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable legacy index entry");
                    continue;
                }
            };

            let id = BackupId::from_legacy_sequence(entry.id);
            let Some(payload) = self.read_snapshot(&entry.owner_id, &id).await else {
                debug!(owner = %entry.owner_id, id = entry.id, "legacy snapshot missing");
                continue;
            };

            let record = migrate_entry(entry, id, payload, now);
            owners.entry(record.owner_id.clone()).or_default().push(record);
        }

        owners
    }

    /// Best-effort removal of the legacy keys of `pruned` records
    ///
    /// Returns how many removals succeeded. Failures are logged and skipped.
    pub async fn cleanup(&self, owner_id: &str, pruned: &[BackupId]) -> usize {
        let mut removed = 0;
        for id in pruned {
            let Some(sequence) = id.legacy_sequence() else {
                continue;
            };
            let key = legacy_key(owner_id, sequence);
            match self.kv.remove(&key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "legacy cleanup failed"),
            }
        }
        removed
    }
}

fn migrate_entry(
    entry: LegacyIndexEntry,
    id: BackupId,
    payload: Value,
    now: DateTime<Utc>,
) -> BackupRecord {
    let derived = SummaryMetrics::from_payload(&payload);
    let items_total = entry.items_total.unwrap_or(derived.items_total);
    let items_priced = entry.items_priced.unwrap_or(derived.items_priced);
    let metrics = SummaryMetrics {
        items_total,
        items_priced,
        completion_percentage: entry
            .completion_percentage
            .unwrap_or_else(|| completion_percentage(items_priced, items_total)),
        total_value: entry.total_value.unwrap_or(derived.total_value),
    };

    let timestamp = normalize_timestamp(entry.timestamp.as_deref(), now);
    let mut record = BackupRecord::new(
        entry.owner_id,
        DatasetKind::PricingWorksheet,
        timestamp,
        entry.title.unwrap_or_default(),
        metrics,
        payload,
    );
    record.id = id;
    record.version = LEGACY_RECORD_FORMAT_VERSION.to_string();
    record
}
