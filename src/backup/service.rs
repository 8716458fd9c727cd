//! Backup service
//!
//! Public API over the backup store: create, list, restore, report failure,
//! health, and export. Every mutation runs a load, mutate, save cycle behind
//! one writer lock, because the store is a single document and two
//! interleaved cycles would silently drop one side's changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::export::ExportSnapshot;
use super::legacy::LegacyMigrator;
use super::retention::apply_retention;
use super::store::StoreRepository;
use crate::audit::{AuditAction, AuditEntry, AuditSink, TracingAuditSink};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::error::{BackupError, BackupResult};
use crate::events::{BackupEvent, EventBus};
use crate::models::{
    completion_percentage, level_of, normalize_timestamp, BackupId, BackupRecord, BackupSummary,
    DatasetKind, FailureLevel, FailureState, SummaryMetrics,
};
use crate::storage::KeyValueStore;

/// Caller-supplied details for a new backup
///
/// Metrics left as `None` are derived from the payload.
#[derive(Debug, Clone, Default)]
pub struct CreateBackupOptions {
    pub owner_id: String,
    pub title: Option<String>,
    /// RFC 3339; anything unparsable is replaced by the current time
    pub timestamp: Option<String>,
    pub dataset: Option<DatasetKind>,
    pub items_total: Option<u64>,
    pub items_priced: Option<u64>,
    pub completion_percentage: Option<f64>,
    pub total_value: Option<f64>,
}

impl CreateBackupOptions {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    fn metrics(&self, payload: &Value) -> SummaryMetrics {
        let derived = SummaryMetrics::from_payload(payload);
        let items_total = self.items_total.unwrap_or(derived.items_total);
        let items_priced = self.items_priced.unwrap_or(derived.items_priced);
        SummaryMetrics {
            items_total,
            items_priced,
            completion_percentage: self
                .completion_percentage
                .unwrap_or_else(|| completion_percentage(items_priced, items_total)),
            total_value: self.total_value.unwrap_or(derived.total_value),
        }
    }
}

/// Public API of the backup retention store
pub struct BackupService {
    repository: StoreRepository,
    settings: Settings,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    audit: Arc<dyn AuditSink>,
    write_lock: Mutex<()>,
}

impl BackupService {
    /// Create a service over `kv` with the system clock and its own event bus
    ///
    /// Audit entries go to `tracing` until `with_audit_sink` replaces the sink.
    pub fn new(kv: Arc<dyn KeyValueStore>, settings: Settings) -> Self {
        let events = Arc::new(EventBus::new(settings.event_history_capacity));
        Self {
            repository: StoreRepository::new(kv, settings.clone()),
            settings,
            clock: Arc::new(SystemClock),
            events,
            audit: Arc::new(TracingAuditSink),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Bus the service publishes on
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Take a new backup of `payload` and apply the retention rule
    ///
    /// Clears the owner's failure counter. Fails with `Validation` when the
    /// owner id is empty, or when the backup's timestamp is so old that the
    /// rule would prune it in the same pass (nothing is saved or emitted).
    /// Fails with `StoreWrite` when the store cannot be written; the caller
    /// is then expected to call [`report_failure`](Self::report_failure).
    pub async fn create(
        &self,
        payload: Value,
        options: CreateBackupOptions,
    ) -> BackupResult<BackupSummary> {
        let owner_id = options.owner_id.trim().to_string();
        if owner_id.is_empty() {
            return Err(BackupError::Validation("Owner id cannot be empty".into()));
        }

        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let mut store = self.repository.load(now).await;

        let dataset = options.dataset.unwrap_or_default();
        let rule = self.settings.rule_for(dataset);
        let timestamp = normalize_timestamp(options.timestamp.as_deref(), now);
        let title = options
            .title
            .clone()
            .unwrap_or_else(|| format!("Backup {}", timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        let metrics = options.metrics(&payload);

        let record = BackupRecord::new(&owner_id, dataset, timestamp, title, metrics, payload);
        let backup_id = record.id.clone();

        let mut candidates = store.take_records(&owner_id);
        candidates.push(record);
        let outcome = apply_retention(candidates, &rule, now);

        // A backup the rule would drop straight away is never stored
        let summary = match outcome.kept.iter().find(|r| r.id == backup_id) {
            Some(record) => record.summary(),
            None => {
                return Err(BackupError::Validation(format!(
                    "Backup time {} falls outside the retention window for {}",
                    timestamp.to_rfc3339(),
                    dataset
                )))
            }
        };
        let retained = outcome.kept.len();
        let pruned_ids: Vec<BackupId> = outcome.pruned.iter().map(|r| r.id.clone()).collect();

        store.set_records(&owner_id, outcome.kept);
        if store.clear_failure(&owner_id).is_some() {
            debug!(owner = %owner_id, "failure counter cleared");
        }

        self.repository.save(&mut store, now).await?;

        if !pruned_ids.is_empty() {
            let event = BackupEvent::RetentionApplied {
                dataset,
                owner_id: owner_id.clone(),
                pruned: pruned_ids.len(),
                retained,
            };
            let entry = AuditEntry::success(
                AuditAction::RetentionPrune,
                &owner_id,
                None,
                with_pruned_ids(event.metadata(), &pruned_ids),
            );
            self.emit(event, entry);
        }

        let event = BackupEvent::Completed {
            dataset,
            owner_id: owner_id.clone(),
            backup_id: Some(backup_id.clone()),
            retained,
            pruned: pruned_ids.len(),
        };
        let entry = AuditEntry::success(
            AuditAction::Create,
            &owner_id,
            Some(backup_id.to_string()),
            event.metadata(),
        );
        self.emit(event, entry);

        if !pruned_ids.is_empty() {
            self.migrator().cleanup(&owner_id, &pruned_ids).await;
        }

        info!(
            owner = %owner_id,
            backup = %backup_id,
            retained,
            pruned = pruned_ids.len(),
            "backup created"
        );
        Ok(summary)
    }

    /// Summaries of `owner_id`'s backups, newest first
    pub async fn list(&self, owner_id: &str) -> Vec<BackupSummary> {
        let store = self.repository.load(self.clock.now()).await;
        let mut summaries: Vec<BackupSummary> =
            store.records(owner_id).iter().map(BackupSummary::from).collect();
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        summaries
    }

    /// The payload of one backup, or `None` if it exists nowhere
    ///
    /// Looks in the current store first, then under the legacy key when
    /// `backup_id` is a legacy sequence number.
    pub async fn restore(&self, owner_id: &str, backup_id: &str) -> Option<Value> {
        let id = BackupId::from_raw(backup_id.trim());
        let store = self.repository.load(self.clock.now()).await;
        let retained = store.records(owner_id).len();

        if let Some(record) = store.find(owner_id, &id) {
            let payload = record.payload.clone();
            self.emit_restored(record.dataset_key, owner_id, &id, retained, "store");
            return Some(payload);
        }

        if let Some(payload) = self.migrator().read_snapshot(owner_id, &id).await {
            self.emit_restored(DatasetKind::default(), owner_id, &id, retained, "legacy");
            return Some(payload);
        }

        let event = BackupEvent::Failed {
            dataset: DatasetKind::default(),
            owner_id: owner_id.to_string(),
            backup_id: Some(id.clone()),
            error: BackupError::backup_not_found(id.as_str()).to_string(),
            consecutive_failures: store.failure(owner_id).map_or(0, |s| s.count),
            reason: Some("not-found".into()),
        };
        let entry = AuditEntry::failure(
            AuditAction::Restore,
            owner_id,
            Some(id.to_string()),
            event.metadata(),
        );
        self.emit(event, entry);

        debug!(owner = %owner_id, backup = %id, "restore found nothing");
        None
    }

    /// Record a failed backup attempt for `owner_id`
    ///
    /// Never fails. If the counter cannot be persisted the returned state is
    /// still incremented, but only lives in memory.
    pub async fn report_failure(&self, owner_id: &str, error: &str) -> FailureState {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let mut store = self.repository.load(now).await;

        let state = FailureState::register(store.failure(owner_id), error, now);
        store.set_failure(owner_id, state.clone());

        if let Err(e) = self.repository.save(&mut store, now).await {
            warn!(owner = %owner_id, error = %e, "failure counter not persisted");
        }

        let dataset = DatasetKind::default();
        let event = BackupEvent::Failed {
            dataset,
            owner_id: owner_id.to_string(),
            backup_id: None,
            error: error.to_string(),
            consecutive_failures: state.count,
            reason: None,
        };
        let entry = AuditEntry::failure(AuditAction::Create, owner_id, None, event.metadata());
        self.emit(event, entry);

        if state.is_alerting(self.settings.alert_threshold) {
            let event = BackupEvent::FailureAlert {
                dataset,
                owner_id: owner_id.to_string(),
                error: error.to_string(),
                consecutive_failures: state.count,
            };
            let mut metadata = event.metadata();
            metadata["alert"] = Value::Bool(true);
            let entry = AuditEntry::failure(AuditAction::Create, owner_id, None, metadata);
            self.emit(event, entry);
            warn!(owner = %owner_id, count = state.count, error, "backup failures escalated");
        }

        state
    }

    /// Failure counters of every owner that is not healthy
    pub async fn health(&self) -> BTreeMap<String, FailureState> {
        self.repository
            .load(self.clock.now())
            .await
            .failure_counters
    }

    /// Health level of one owner
    pub async fn failure_level(&self, owner_id: &str) -> FailureLevel {
        let store = self.repository.load(self.clock.now()).await;
        level_of(store.failure(owner_id), self.settings.alert_threshold)
    }

    /// Full read-only dump of the store
    pub async fn export_snapshot(&self) -> ExportSnapshot {
        let now = self.clock.now();
        let store = self.repository.load(now).await;
        ExportSnapshot::from_store(&store, self.settings.retention.clone(), now)
    }

    fn migrator(&self) -> &LegacyMigrator {
        self.repository.migrator()
    }

    fn emit_restored(
        &self,
        dataset: DatasetKind,
        owner_id: &str,
        id: &BackupId,
        retained: usize,
        source: &str,
    ) {
        let event = BackupEvent::Completed {
            dataset,
            owner_id: owner_id.to_string(),
            backup_id: Some(id.clone()),
            retained,
            pruned: 0,
        };
        let mut metadata = event.metadata();
        metadata["source"] = Value::String(source.to_string());
        let entry = AuditEntry::success(AuditAction::Restore, owner_id, Some(id.to_string()), metadata);
        self.emit(event, entry);
        debug!(owner = %owner_id, backup = %id, source, "backup restored");
    }

    /// Publish `event` and record `entry` at the service clock's time
    ///
    /// Sink errors are logged and dropped.
    fn emit(&self, event: BackupEvent, entry: AuditEntry) {
        self.events.publish(&event);
        let entry = entry.at(self.clock.now());
        if let Err(e) = self.audit.record(&entry) {
            warn!(topic = event.topic(), error = %e, "audit entry dropped");
        }
    }
}

fn with_pruned_ids(mut metadata: Value, pruned: &[BackupId]) -> Value {
    metadata["prunedIds"] = json!(pruned.iter().map(BackupId::as_str).collect::<Vec<_>>());
    metadata
}
