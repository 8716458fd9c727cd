//! tender-backup - bounded backup retention store for tender pricing worksheets
//!
//! Every save of a pricing worksheet can be snapshotted into a per-owner
//! backup history. The history is bounded by a retention rule (count and
//! age), repeated failures escalate into alerts, and backups written by the
//! older one-key-per-backup layout are still readable.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Path resolution and settings
//! - `error`: Custom error types
//! - `models`: Records, retention rules, failure state
//! - `clock`: Injectable time source
//! - `storage`: Key-value persistence primitive
//! - `backup`: Retention engine, store, legacy migration, public service
//! - `events`: Domain events and the publish/subscribe bus
//! - `audit`: Audit trail of backup operations
//! - `cli`: Command handlers for the `tender-backup` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use tender_backup::config::{StorePaths, Settings};
//!
//! let paths = StorePaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! ```

pub mod audit;
pub mod backup;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod storage;

pub use error::{BackupError, BackupResult};
