//! Bounded backup history for pricing worksheets
//!
//! Keeps a capped, age-limited list of worksheet snapshots per owner and
//! escalates repeated backup failures.
//!
//! # Architecture
//!
//! - `apply_retention`: pure function that splits an owner's records into
//!   kept and pruned under a `RetentionRule`
//! - `BackupStore` / `StoreRepository`: the persisted aggregate, loaded and
//!   rewritten as one document through a `KeyValueStore`
//! - `LegacyMigrator`: reads backups from the old one-key-per-backup layout
//! - `BackupService`: the public API, emitting events and audit entries
//! - `ExportSnapshot`: read-only dump of the whole store
//!
//! # Retention Policy
//!
//! Retention runs on every `create`, never in the background. By default
//! an owner keeps at most 10 backups, none older than 30 days.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tender_backup::backup::{BackupService, CreateBackupOptions};
//! use tender_backup::config::Settings;
//! use tender_backup::storage::MemoryKeyValueStore;
//!
//! let service = BackupService::new(Arc::new(MemoryKeyValueStore::new()), Settings::default());
//!
//! let summary = service
//!     .create(worksheet, CreateBackupOptions::for_owner("T-100"))
//!     .await?;
//! let payload = service.restore("T-100", summary.id.as_str()).await;
//! ```

mod export;
mod legacy;
mod retention;
mod service;
mod store;

pub use export::{ExportEntry, ExportSnapshot, ExportTotals};
pub use legacy::{legacy_key, LegacyMigrator, LEGACY_KEY_PREFIX};
pub use retention::{apply_retention, RetentionOutcome};
pub use service::{BackupService, CreateBackupOptions};
pub use store::{BackupStore, StoreRepository, STORE_FORMAT_VERSION, STORE_KEY};
