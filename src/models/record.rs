//! Backup record model
//!
//! A record is one immutable snapshot of an owner's pricing worksheet plus
//! the summary metrics shown in backup listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::BackupId;
use super::retention::DatasetKind;

/// Format version stamped on records written by this crate
pub const RECORD_FORMAT_VERSION: &str = "2";

/// Format version stamped on records migrated from the legacy scheme
pub const LEGACY_RECORD_FORMAT_VERSION: &str = "1";

/// Summary metrics derived from a worksheet payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub items_total: u64,
    pub items_priced: u64,
    pub completion_percentage: f64,
    pub total_value: f64,
}

impl SummaryMetrics {
    /// Derive metrics from the `items` array of a worksheet payload
    ///
    /// An item counts as priced when its `unitPrice` is a positive number.
    /// Its line total is `total` when numeric, otherwise
    /// `quantity * unitPrice`.
    pub fn from_payload(payload: &Value) -> Self {
        let items = payload
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let items_total = items.len() as u64;
        let items_priced = items
            .iter()
            .filter(|item| number(item, "unitPrice").is_some_and(|p| p > 0.0))
            .count() as u64;
        let total_value = items.iter().map(line_total).sum();

        Self {
            items_total,
            items_priced,
            completion_percentage: completion_percentage(items_priced, items_total),
            total_value,
        }
    }
}

fn number(item: &Value, field: &str) -> Option<f64> {
    item.get(field).and_then(Value::as_f64)
}

fn line_total(item: &Value) -> f64 {
    if let Some(total) = number(item, "total") {
        return total;
    }
    match (number(item, "quantity"), number(item, "unitPrice")) {
        (Some(quantity), Some(price)) => quantity * price,
        _ => 0.0,
    }
}

/// `priced / total * 100`, rounded to two decimals; 0 for an empty worksheet
pub fn completion_percentage(priced: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = priced as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Parse an RFC 3339 timestamp, falling back to `now` when it is missing or malformed
pub fn normalize_timestamp(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or(now)
}

/// One persisted backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: BackupId,
    pub dataset_key: DatasetKind,
    /// Key of the retention rule this record is governed by
    pub retention_key: String,
    pub timestamp: DateTime<Utc>,
    pub owner_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub completion_percentage: f64,
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub items_total: u64,
    #[serde(default)]
    pub items_priced: u64,
    /// Format version of this record
    pub version: String,
    /// Recomputed each time the record survives a retention pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_expires_at: Option<DateTime<Utc>>,
    /// The worksheet snapshot, opaque to this crate
    pub payload: Value,
}

impl BackupRecord {
    /// Build a fresh record with a generated ID
    pub fn new(
        owner_id: impl Into<String>,
        dataset: DatasetKind,
        timestamp: DateTime<Utc>,
        title: impl Into<String>,
        metrics: SummaryMetrics,
        payload: Value,
    ) -> Self {
        Self {
            id: BackupId::generate(),
            dataset_key: dataset,
            retention_key: dataset.key().to_string(),
            timestamp,
            owner_id: owner_id.into(),
            title: title.into(),
            completion_percentage: metrics.completion_percentage,
            total_value: metrics.total_value,
            items_total: metrics.items_total,
            items_priced: metrics.items_priced,
            version: RECORD_FORMAT_VERSION.to_string(),
            retention_expires_at: None,
            payload,
        }
    }

    /// Summary metrics carried by this record
    pub fn metrics(&self) -> SummaryMetrics {
        SummaryMetrics {
            items_total: self.items_total,
            items_priced: self.items_priced,
            completion_percentage: self.completion_percentage,
            total_value: self.total_value,
        }
    }

    /// The record without its payload
    pub fn summary(&self) -> BackupSummary {
        BackupSummary::from(self)
    }
}

/// A backup record without its payload, as returned by listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
    pub id: BackupId,
    pub dataset_key: DatasetKind,
    pub retention_key: String,
    pub timestamp: DateTime<Utc>,
    pub owner_id: String,
    pub title: String,
    pub completion_percentage: f64,
    pub total_value: f64,
    pub items_total: u64,
    pub items_priced: u64,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_expires_at: Option<DateTime<Utc>>,
}

impl From<&BackupRecord> for BackupSummary {
    fn from(record: &BackupRecord) -> Self {
        Self {
            id: record.id.clone(),
            dataset_key: record.dataset_key,
            retention_key: record.retention_key.clone(),
            timestamp: record.timestamp,
            owner_id: record.owner_id.clone(),
            title: record.title.clone(),
            completion_percentage: record.completion_percentage,
            total_value: record.total_value,
            items_total: record.items_total,
            items_priced: record.items_priced,
            version: record.version.clone(),
            retention_expires_at: record.retention_expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_metrics_from_payload() {
        let payload = json!({
            "items": [
                {"code": "1.1", "quantity": 10, "unitPrice": 2.5},
                {"code": "1.2", "quantity": 4, "unitPrice": 0},
                {"code": "1.3", "total": 100.0, "unitPrice": 50},
                {"code": "1.4"}
            ]
        });

        let metrics = SummaryMetrics::from_payload(&payload);
        assert_eq!(metrics.items_total, 4);
        assert_eq!(metrics.items_priced, 2);
        assert_eq!(metrics.completion_percentage, 50.0);
        assert_eq!(metrics.total_value, 125.0);
    }

    #[test]
    fn test_metrics_without_items() {
        let metrics = SummaryMetrics::from_payload(&json!({"title": "empty"}));
        assert_eq!(metrics, SummaryMetrics::default());
    }

    #[test]
    fn test_completion_percentage_rounding() {
        assert_eq!(completion_percentage(1, 3), 33.33);
        assert_eq!(completion_percentage(2, 3), 66.67);
        assert_eq!(completion_percentage(0, 0), 0.0);
    }

    #[test]
    fn test_normalize_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let parsed = normalize_timestamp(Some("2025-01-01T00:00:00Z"), now);
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        let offset = normalize_timestamp(Some("2025-01-01T02:00:00+02:00"), now);
        assert_eq!(offset, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        assert_eq!(normalize_timestamp(Some("yesterday"), now), now);
        assert_eq!(normalize_timestamp(None, now), now);
    }

    #[test]
    fn test_record_serialization_shape() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let record = BackupRecord::new(
            "T-100",
            DatasetKind::PricingWorksheet,
            ts,
            "Main tender",
            SummaryMetrics::default(),
            json!({"items": []}),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["ownerId"], "T-100");
        assert_eq!(value["datasetKey"], "pricing-worksheet");
        assert_eq!(value["retentionKey"], "pricing-worksheet");
        assert_eq!(value["version"], RECORD_FORMAT_VERSION);
        assert!(value.get("retentionExpiresAt").is_none());
    }

    #[test]
    fn test_summary_drops_payload() {
        let record = BackupRecord::new(
            "T-1",
            DatasetKind::PricingWorksheet,
            Utc::now(),
            "",
            SummaryMetrics::default(),
            json!({"big": "payload"}),
        );
        let value = serde_json::to_value(record.summary()).unwrap();
        assert!(value.get("payload").is_none());
        assert_eq!(value["id"], record.id.as_str());
    }
}
