//! Storage layer for the backup store
//!
//! The backup service only needs a durable key-value primitive with
//! `load`/`save`/`remove`. This module defines that seam and ships two
//! implementations: an in-memory map and a directory of JSON files written
//! atomically.

pub mod file_io;
pub mod file_kv;
pub mod memory;

use async_trait::async_trait;

use crate::error::BackupResult;

pub use file_kv::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;

/// Durable key-value persistence primitive
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, `None` if absent
    async fn load(&self, key: &str) -> BackupResult<Option<String>>;

    /// Replace the value stored under `key`
    async fn save(&self, key: &str, value: &str) -> BackupResult<()>;

    /// Delete `key`; deleting a missing key succeeds
    async fn remove(&self, key: &str) -> BackupResult<()>;
}
