//! Dataset kinds and their retention rules

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted age cap (100 years)
pub const MAX_AGE_DAYS_LIMIT: u32 = 36_500;

/// Kind of document being backed up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    /// A tender's pricing worksheet (bill of quantities with unit prices)
    #[default]
    PricingWorksheet,
}

impl DatasetKind {
    /// Stable key used in persisted records and rule maps
    pub fn key(&self) -> &'static str {
        match self {
            DatasetKind::PricingWorksheet => "pricing-worksheet",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pricing-worksheet" => Ok(DatasetKind::PricingWorksheet),
            other => Err(format!("Unknown dataset kind: {}", other)),
        }
    }
}

/// How many backups, and how old, may be kept per owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionRule {
    /// Hard cap on kept records per owner
    pub max_entries: usize,
    /// Records older than this are pruned; `None` disables age expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,
}

impl RetentionRule {
    /// A count-only rule
    pub fn max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            max_age_days: None,
        }
    }

    /// Add an age cap
    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age_days = Some(days);
        self
    }

    /// Age cap as a duration
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_days.map(|days| Duration::days(i64::from(days)))
    }

    /// When a record taken at `timestamp` stops being eligible
    ///
    /// `None` when there is no age cap, or when the expiry falls past the
    /// representable range (the record never expires).
    pub fn expires_at(&self, timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age()
            .and_then(|age| timestamp.checked_add_signed(age))
    }

    /// Validate the rule
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("maxEntries must be at least 1".into());
        }
        if let Some(days) = self.max_age_days {
            if days > MAX_AGE_DAYS_LIMIT {
                return Err(format!(
                    "maxAgeDays must be at most {} (got {})",
                    MAX_AGE_DAYS_LIMIT, days
                ));
            }
        }
        Ok(())
    }
}

impl Default for RetentionRule {
    fn default() -> Self {
        Self {
            max_entries: 10,
            max_age_days: Some(30),
        }
    }
}
