//! Backup store aggregate and its repository
//!
//! The whole store is one JSON document under a well-known key. It is
//! loaded fresh for every operation and fully rewritten on every mutation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::legacy::LegacyMigrator;
use super::retention::apply_retention;
use crate::config::Settings;
use crate::error::{BackupError, BackupResult};
use crate::models::{normalize_timestamp, BackupId, BackupRecord, DatasetKind, FailureState};
use crate::storage::KeyValueStore;

/// Key the store document is persisted under
pub const STORE_KEY: &str = "tender-backups:store";

/// Format version of the store document
pub const STORE_FORMAT_VERSION: &str = "2";

/// The persisted aggregate: every owner's records and failure counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStore {
    pub version: String,
    pub updated_at: DateTime<Utc>,
    /// Records per owner, newest first
    #[serde(default)]
    pub owners: BTreeMap<String, Vec<BackupRecord>>,
    /// Present only for owners with at least one consecutive failure
    #[serde(default)]
    pub failure_counters: BTreeMap<String, FailureState>,
}

impl BackupStore {
    /// A store with no owners and no failures
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: STORE_FORMAT_VERSION.to_string(),
            updated_at: now,
            owners: BTreeMap::new(),
            failure_counters: BTreeMap::new(),
        }
    }

    /// Records of `owner_id`, as stored
    pub fn records(&self, owner_id: &str) -> &[BackupRecord] {
        self.owners.get(owner_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Remove and return the records of `owner_id`
    pub fn take_records(&mut self, owner_id: &str) -> Vec<BackupRecord> {
        self.owners.remove(owner_id).unwrap_or_default()
    }

    /// Replace the records of `owner_id`; an empty list drops the owner
    pub fn set_records(&mut self, owner_id: &str, records: Vec<BackupRecord>) {
        if records.is_empty() {
            self.owners.remove(owner_id);
        } else {
            self.owners.insert(owner_id.to_string(), records);
        }
    }

    /// Find one record of `owner_id`
    pub fn find(&self, owner_id: &str, backup_id: &BackupId) -> Option<&BackupRecord> {
        self.records(owner_id).iter().find(|r| &r.id == backup_id)
    }

    pub fn failure(&self, owner_id: &str) -> Option<&FailureState> {
        self.failure_counters.get(owner_id)
    }

    pub fn set_failure(&mut self, owner_id: &str, state: FailureState) {
        self.failure_counters.insert(owner_id.to_string(), state);
    }

    /// Forget the failure counter of `owner_id`
    pub fn clear_failure(&mut self, owner_id: &str) -> Option<FailureState> {
        self.failure_counters.remove(owner_id)
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    pub fn record_count(&self) -> usize {
        self.owners.values().map(Vec::len).sum()
    }
}

/// Loads and saves the store document through the key-value primitive
#[derive(Clone)]
pub struct StoreRepository {
    kv: Arc<dyn KeyValueStore>,
    migrator: LegacyMigrator,
    settings: Settings,
}

impl StoreRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>, settings: Settings) -> Self {
        Self {
            migrator: LegacyMigrator::new(Arc::clone(&kv)),
            kv,
            settings,
        }
    }

    /// Load the store as of `now`
    ///
    /// A missing, unreadable, or unrecognized document yields an empty store.
    /// A legacy index is migrated in memory and bounded by the retention
    /// rules; the legacy keys themselves are left untouched.
    pub async fn load(&self, now: DateTime<Utc>) -> BackupStore {
        let raw = match self.kv.load(STORE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return BackupStore::empty(now),
            Err(e) => {
                warn!(error = %e, "backup store read failed, starting empty");
                return BackupStore::empty(now);
            }
        };

        let blob: Value = match serde_json::from_str(&raw) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "backup store is not valid JSON, starting empty");
                return BackupStore::empty(now);
            }
        };

        if let Some(index) = LegacyMigrator::legacy_index(&blob) {
            return self.migrate_legacy(index, now).await;
        }

        match parse_current(blob, now) {
            Some(store) => store,
            None => {
                warn!("backup store has an unrecognized shape, starting empty");
                BackupStore::empty(now)
            }
        }
    }

    /// Serialize and write the full store, stamping `updated_at`
    pub async fn save(&self, store: &mut BackupStore, now: DateTime<Utc>) -> BackupResult<()> {
        store.version = STORE_FORMAT_VERSION.to_string();
        store.updated_at = now;

        let json = serde_json::to_string(store)
            .map_err(|e| BackupError::StoreWrite(format!("Failed to serialize store: {}", e)))?;

        self.kv.save(STORE_KEY, &json).await.map_err(|e| match e {
            BackupError::StoreWrite(_) => e,
            other => BackupError::StoreWrite(other.to_string()),
        })?;

        debug!(
            owners = store.owner_count(),
            records = store.record_count(),
            "backup store saved"
        );
        Ok(())
    }

    /// Reader for legacy snapshots, sharing this repository's key-value store
    pub fn migrator(&self) -> &LegacyMigrator {
        &self.migrator
    }

    async fn migrate_legacy(&self, index: &[Value], now: DateTime<Utc>) -> BackupStore {
        let owners = self.migrator.migrate_index(index, now).await;
        let mut store = BackupStore::empty(now);
        let rule = self.settings.rule_for(DatasetKind::PricingWorksheet);

        for (owner_id, records) in owners {
            let outcome = apply_retention(records, &rule, now);
            store.set_records(&owner_id, outcome.kept);
        }

        info!(
            entries = index.len(),
            owners = store.owner_count(),
            records = store.record_count(),
            "migrated legacy backup index"
        );
        store
    }
}

/// Parse a current-format document, normalizing malformed timestamps to `now`
fn parse_current(mut blob: Value, now: DateTime<Utc>) -> Option<BackupStore> {
    let fields = blob.as_object_mut()?;
    if !fields.contains_key("owners") && !fields.contains_key("failureCounters") {
        return None;
    }

    if let Some(Value::Object(owners)) = fields.get_mut("owners") {
        for records in owners.values_mut() {
            if let Value::Array(records) = records {
                for record in records.iter_mut() {
                    normalize_field(record, "timestamp", now);
                }
            }
        }
    }
    if let Some(Value::Object(counters)) = fields.get_mut("failureCounters") {
        for state in counters.values_mut() {
            normalize_field(state, "lastFailureAt", now);
        }
    }
    if !matches!(fields.get("version"), Some(Value::String(_))) {
        fields.insert("version".into(), Value::String(STORE_FORMAT_VERSION.into()));
    }
    normalize_field(&mut blob, "updatedAt", now);

    match serde_json::from_value::<BackupStore>(blob) {
        Ok(mut store) => {
            for records in store.owners.values_mut() {
                records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            }
            store.owners.retain(|_, records| !records.is_empty());
            Some(store)
        }
        Err(e) => {
            debug!(error = %e, "backup store failed to deserialize");
            None
        }
    }
}

fn normalize_field(object: &mut Value, field: &str, now: DateTime<Utc>) {
    if let Value::Object(fields) = object {
        let normalized = normalize_timestamp(fields.get(field).and_then(Value::as_str), now);
        fields.insert(field.to_string(), Value::String(normalized.to_rfc3339()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::legacy::legacy_key;
    use crate::models::{RetentionRule, SummaryMetrics};
    use crate::storage::MemoryKeyValueStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
    }

    fn repository(kv: Arc<MemoryKeyValueStore>, rule: RetentionRule) -> StoreRepository {
        let mut settings = Settings::default();
        settings.set_rule(DatasetKind::PricingWorksheet, rule);
        StoreRepository::new(kv, settings)
    }

    fn record(owner: &str, at: DateTime<Utc>) -> BackupRecord {
        BackupRecord::new(
            owner,
            DatasetKind::PricingWorksheet,
            at,
            "snapshot",
            SummaryMetrics::default(),
            json!({"items": []}),
        )
    }

    #[tokio::test]
    async fn test_missing_store_is_empty() {
        let repo = repository(Arc::new(MemoryKeyValueStore::new()), RetentionRule::default());
        let store = repo.load(now()).await;
        assert_eq!(store, BackupStore::empty(now()));
    }

    #[tokio::test]
    async fn test_malformed_store_is_empty() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let repo = repository(kv.clone(), RetentionRule::default());

        kv.save(STORE_KEY, "{{{ not json").await.unwrap();
        assert_eq!(repo.load(now()).await.record_count(), 0);

        kv.save(STORE_KEY, r#"{"something": "else"}"#).await.unwrap();
        assert_eq!(repo.load(now()).await.record_count(), 0);

        kv.save(STORE_KEY, "42").await.unwrap();
        assert_eq!(repo.load(now()).await.record_count(), 0);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let repo = repository(kv, RetentionRule::default());

        let mut store = BackupStore::empty(now());
        store.set_records("T-1", vec![record("T-1", now())]);
        store.set_failure("T-2", FailureState::register(None, "disk-full", now()));

        let later = now() + Duration::hours(1);
        repo.save(&mut store, later).await.unwrap();
        assert_eq!(store.updated_at, later);

        let loaded = repo.load(later).await;
        assert_eq!(loaded, store);
    }

    #[tokio::test]
    async fn test_bad_timestamps_normalized_on_load() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let repo = repository(kv.clone(), RetentionRule::default());

        let mut bad = serde_json::to_value(record("T-1", now())).unwrap();
        bad["timestamp"] = json!("not-a-date");
        let doc = json!({
            "version": "2",
            "updatedAt": "2025-01-01T00:00:00Z",
            "owners": {"T-1": [bad]},
            "failureCounters": {"T-1": {"count": 1, "lastFailureAt": 5, "lastError": "x"}}
        });
        kv.save(STORE_KEY, &doc.to_string()).await.unwrap();

        let store = repo.load(now()).await;
        assert_eq!(store.records("T-1")[0].timestamp, now());
        assert_eq!(store.failure("T-1").unwrap().last_failure_at, now());
    }

    #[tokio::test]
    async fn test_legacy_index_migrated_and_bounded() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let mut index = Vec::new();
        for seq in 0..5u64 {
            kv.save(&legacy_key("T-OLD", seq), r#"{"items": []}"#)
                .await
                .unwrap();
            let ts = now() - Duration::days(1) + Duration::minutes(seq as i64);
            index.push(json!({"id": seq, "tenderId": "T-OLD", "timestamp": ts.to_rfc3339()}));
        }
        kv.save(STORE_KEY, &Value::Array(index).to_string())
            .await
            .unwrap();

        let repo = repository(kv.clone(), RetentionRule::max_entries(3));
        let store = repo.load(now()).await;

        let ids: Vec<&str> = store.records("T-OLD").iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "3", "2"]);

        // Loading never deletes legacy data
        for seq in 0..5u64 {
            assert!(kv.contains(&legacy_key("T-OLD", seq)).await);
        }
    }

    #[test]
    fn test_store_accessors() {
        let mut store = BackupStore::empty(now());
        let r = record("T-1", now());
        let id = r.id.clone();
        store.set_records("T-1", vec![r]);

        assert!(store.find("T-1", &id).is_some());
        assert!(store.find("T-2", &id).is_none());
        assert_eq!(store.owner_count(), 1);
        assert_eq!(store.record_count(), 1);

        store.set_records("T-1", Vec::new());
        assert_eq!(store.owner_count(), 0);
    }
}
