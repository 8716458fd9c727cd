//! Full read-only dump of the backup store
//!
//! Exports the store with its retention rules and totals, as JSON or YAML.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::BackupStore;
use crate::error::{BackupError, BackupResult};
use crate::models::{BackupSummary, FailureState, RetentionRule};

/// Aggregate counts across all owners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTotals {
    pub owners: usize,
    pub entries: usize,
}

/// One exported backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub summary: BackupSummary,
    pub payload: Value,
}

/// Full export structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    /// Store format version
    pub version: String,
    pub generated_at: DateTime<Utc>,
    /// Active retention rules keyed by dataset
    pub retention: BTreeMap<String, RetentionRule>,
    pub totals: ExportTotals,
    /// Every owner's backups, newest first
    pub owners: BTreeMap<String, Vec<ExportEntry>>,
    pub failures: BTreeMap<String, FailureState>,
}

impl ExportSnapshot {
    /// Build the export from a loaded store
    pub fn from_store(
        store: &BackupStore,
        retention: BTreeMap<String, RetentionRule>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let owners = store
            .owners
            .iter()
            .map(|(owner_id, records)| {
                let mut entries: Vec<ExportEntry> = records
                    .iter()
                    .map(|record| ExportEntry {
                        summary: record.summary(),
                        payload: record.payload.clone(),
                    })
                    .collect();
                entries.sort_by(|a, b| b.summary.timestamp.cmp(&a.summary.timestamp));
                (owner_id.clone(), entries)
            })
            .collect();

        Self {
            version: store.version.clone(),
            generated_at,
            retention,
            totals: ExportTotals {
                owners: store.owner_count(),
                entries: store.record_count(),
            },
            owners,
            failures: store.failure_counters.clone(),
        }
    }

    /// Write the export as pretty-printed JSON
    pub fn write_json<W: Write>(&self, writer: &mut W) -> BackupResult<()> {
        serde_json::to_writer_pretty(&mut *writer, self)
            .map_err(|e| BackupError::Export(e.to_string()))?;
        writeln!(writer).map_err(|e| BackupError::Export(e.to_string()))?;
        Ok(())
    }

    /// Write the export as YAML with a short header comment
    pub fn write_yaml<W: Write>(&self, writer: &mut W) -> BackupResult<()> {
        writeln!(writer, "# Tender backup store export")
            .map_err(|e| BackupError::Export(e.to_string()))?;
        writeln!(writer, "# Generated: {}", self.generated_at.to_rfc3339())
            .map_err(|e| BackupError::Export(e.to_string()))?;
        writeln!(writer).map_err(|e| BackupError::Export(e.to_string()))?;

        serde_yaml::to_writer(writer, self).map_err(|e| BackupError::Export(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackupRecord, DatasetKind, SummaryMetrics};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn sample_store() -> BackupStore {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut store = BackupStore::empty(now);
        let records = (0..3)
            .map(|i| {
                BackupRecord::new(
                    "T-1",
                    DatasetKind::PricingWorksheet,
                    now + Duration::minutes(i),
                    format!("r{}", i),
                    SummaryMetrics::default(),
                    json!({"seq": i}),
                )
            })
            .collect();
        store.set_records("T-1", records);
        store.set_failure("T-2", FailureState::register(None, "disk-full", now));
        store
    }

    fn rules() -> BTreeMap<String, RetentionRule> {
        let mut rules = BTreeMap::new();
        rules.insert("pricing-worksheet".into(), RetentionRule::max_entries(10));
        rules
    }

    #[test]
    fn test_export_shape() {
        let store = sample_store();
        let export = ExportSnapshot::from_store(&store, rules(), Utc::now());

        assert_eq!(export.totals, ExportTotals { owners: 1, entries: 3 });
        assert_eq!(export.owners["T-1"][0].summary.title, "r2");
        assert_eq!(export.owners["T-1"][0].payload, json!({"seq": 2}));
        assert_eq!(export.failures["T-2"].count, 1);

        let value = serde_json::to_value(&export).unwrap();
        assert!(value.get("generatedAt").is_some());
        assert_eq!(value["retention"]["pricing-worksheet"]["maxEntries"], 10);
        assert_eq!(value["totals"]["entries"], 3);
    }

    #[test]
    fn test_write_json_parses_back() {
        let export = ExportSnapshot::from_store(&sample_store(), rules(), Utc::now());
        let mut buffer = Vec::new();
        export.write_json(&mut buffer).unwrap();

        let parsed: ExportSnapshot = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed, export);
    }

    #[test]
    fn test_write_yaml() {
        let export = ExportSnapshot::from_store(&sample_store(), rules(), Utc::now());
        let mut buffer = Vec::new();
        export.write_yaml(&mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("# Tender backup store export"));
        assert!(text.contains("T-1"));
        assert!(text.contains("maxEntries: 10"));
    }
}
