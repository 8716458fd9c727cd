//! Per-owner failure tracking
//!
//! An owner with no failure entry is healthy. The first failure makes it
//! degraded; reaching the alert threshold (2 by default) makes it alerting,
//! and every further failure keeps it there. A successful backup removes the
//! entry entirely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive failures that trigger alert escalation unless configured otherwise
pub const DEFAULT_ALERT_THRESHOLD: u32 = 2;

/// Consecutive-failure counter for one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureState {
    pub count: u32,
    pub last_failure_at: DateTime<Utc>,
    pub last_error: String,
}

/// Health of an owner's backup history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureLevel {
    Healthy,
    Degraded,
    Alerting,
}

impl FailureState {
    /// Register one more failure on top of `previous`
    pub fn register(
        previous: Option<&FailureState>,
        error: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let count = previous.map_or(0, |state| state.count).saturating_add(1);
        Self {
            count,
            last_failure_at: at,
            last_error: error.into(),
        }
    }

    /// Whether this state should raise an alert under `threshold`
    pub fn is_alerting(&self, threshold: u32) -> bool {
        self.count >= threshold.max(1)
    }

    /// Current level under `threshold`
    pub fn level(&self, threshold: u32) -> FailureLevel {
        if self.count == 0 {
            FailureLevel::Healthy
        } else if self.is_alerting(threshold) {
            FailureLevel::Alerting
        } else {
            FailureLevel::Degraded
        }
    }
}

/// Level of an owner that may have no failure entry at all
pub fn level_of(state: Option<&FailureState>, threshold: u32) -> FailureLevel {
    state.map_or(FailureLevel::Healthy, |s| s.level(threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_path() {
        let now = Utc::now();
        assert_eq!(level_of(None, DEFAULT_ALERT_THRESHOLD), FailureLevel::Healthy);

        let first = FailureState::register(None, "disk-full", now);
        assert_eq!(first.count, 1);
        assert_eq!(first.level(DEFAULT_ALERT_THRESHOLD), FailureLevel::Degraded);

        let second = FailureState::register(Some(&first), "disk-full", now);
        assert_eq!(second.count, 2);
        assert_eq!(second.level(DEFAULT_ALERT_THRESHOLD), FailureLevel::Alerting);

        let third = FailureState::register(Some(&second), "quota", now);
        assert_eq!(third.count, 3);
        assert_eq!(third.last_error, "quota");
        assert!(third.is_alerting(DEFAULT_ALERT_THRESHOLD));
    }

    #[test]
    fn test_serialization_shape() {
        let state = FailureState::register(None, "disk-full", Utc::now());
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["lastError"], "disk-full");
        assert!(value.get("lastFailureAt").is_some());
    }
}
