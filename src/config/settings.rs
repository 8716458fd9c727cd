//! User settings for the backup store
//!
//! Manages retention rules per dataset kind, the failure alert threshold,
//! event history sizing, and the default log level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::paths::StorePaths;
use crate::error::BackupError;
use crate::models::{DatasetKind, RetentionRule, DEFAULT_ALERT_THRESHOLD};

/// Settings for the backup store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Retention rule per dataset key
    #[serde(default = "default_retention")]
    pub retention: BTreeMap<String, RetentionRule>,

    /// Consecutive failures after which every further failure raises an alert
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u32,

    /// Number of recent events kept in memory
    #[serde(default = "default_event_history_capacity")]
    pub event_history_capacity: usize,

    /// Default tracing filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_retention() -> BTreeMap<String, RetentionRule> {
    let mut rules = BTreeMap::new();
    rules.insert(
        DatasetKind::PricingWorksheet.key().to_string(),
        RetentionRule::default(),
    );
    rules
}

fn default_alert_threshold() -> u32 {
    DEFAULT_ALERT_THRESHOLD
}

fn default_event_history_capacity() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            retention: default_retention(),
            alert_threshold: default_alert_threshold(),
            event_history_capacity: default_event_history_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Rule governing `dataset`, falling back to the built-in default
    pub fn rule_for(&self, dataset: DatasetKind) -> RetentionRule {
        self.retention
            .get(dataset.key())
            .copied()
            .unwrap_or_default()
    }

    /// Replace the rule for `dataset`
    pub fn set_rule(&mut self, dataset: DatasetKind, rule: RetentionRule) {
        self.retention.insert(dataset.key().to_string(), rule);
    }

    /// Check every rule and the alert threshold
    pub fn validate(&self) -> Result<(), BackupError> {
        for (key, rule) in &self.retention {
            key.parse::<DatasetKind>().map_err(BackupError::Config)?;
            rule.validate()
                .map_err(|e| BackupError::Config(format!("Retention rule '{}': {}", key, e)))?;
        }
        if self.alert_threshold == 0 {
            return Err(BackupError::Config(
                "alert_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &StorePaths) -> Result<Self, BackupError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| BackupError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                BackupError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            settings.validate()?;
            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &StorePaths) -> Result<(), BackupError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| BackupError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| BackupError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        let rule = settings.rule_for(DatasetKind::PricingWorksheet);
        assert_eq!(rule.max_entries, 10);
        assert_eq!(rule.max_age_days, Some(30));
        assert_eq!(settings.alert_threshold, 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = StorePaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.set_rule(DatasetKind::PricingWorksheet, RetentionRule::max_entries(3));
        settings.alert_threshold = 4;
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(
            loaded.rule_for(DatasetKind::PricingWorksheet),
            RetentionRule::max_entries(3)
        );
        assert_eq!(loaded.alert_threshold, 4);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"alert_threshold": 3}"#).unwrap();
        assert_eq!(settings.alert_threshold, 3);
        assert_eq!(settings.event_history_capacity, 100);
        assert!(settings.retention.contains_key("pricing-worksheet"));
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let mut settings = Settings::default();
        settings.set_rule(DatasetKind::PricingWorksheet, RetentionRule::max_entries(0));
        assert!(matches!(settings.validate(), Err(BackupError::Config(_))));

        let mut settings = Settings::default();
        settings
            .retention
            .insert("unknown".into(), RetentionRule::default());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_oversized_age_cap_rejected() {
        let mut settings = Settings::default();
        settings.set_rule(
            DatasetKind::PricingWorksheet,
            RetentionRule::max_entries(10).with_max_age_days(200_000_000),
        );
        assert!(matches!(settings.validate(), Err(BackupError::Config(_))));
    }
}
