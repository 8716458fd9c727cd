//! Custom error types for the backup store
//!
//! This module defines the error hierarchy for the crate using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for backup store operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// The persisted store could not be read
    #[error("Store read failed: {0}")]
    StoreRead(String),

    /// The persisted store could not be written
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Audit sink errors
    #[error("Audit error: {0}")]
    Audit(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),
}

impl BackupError {
    /// Create a "not found" error for backups
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a store write failure
    pub fn is_store_write(&self) -> bool {
        matches!(self, Self::StoreWrite(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for backup store operations
pub type BackupResult<T> = Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackupError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = BackupError::backup_not_found("T-100/42");
        assert_eq!(err.to_string(), "Backup not found: T-100/42");
        assert!(err.is_not_found());
        assert!(!err.is_store_write());
    }

    #[test]
    fn test_store_write_classification() {
        let err = BackupError::StoreWrite("disk-full".into());
        assert!(err.is_store_write());
        assert_eq!(err.to_string(), "Store write failed: disk-full");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BackupError = io_err.into();
        assert!(matches!(err, BackupError::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: BackupError = json_err.into();
        assert!(matches!(err, BackupError::Json(_)));
    }
}
