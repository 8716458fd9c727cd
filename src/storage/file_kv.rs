//! Directory-backed key-value store
//!
//! Each key is one JSON file. Writes go through a temp file and an atomic
//! rename, so a crash never leaves a half-written value behind.

use std::path::PathBuf;

use async_trait::async_trait;

use super::file_io::{read_text, remove_if_exists, write_text_atomic};
use super::KeyValueStore;
use crate::error::{BackupError, BackupResult};

/// Key-value store with one file per key under a directory
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding the key files
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// File that stores `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

/// Map a key to a file stem
///
/// `[A-Za-z0-9.-]` pass through; every other UTF-8 byte (including `_`)
/// becomes `_XX` in uppercase hex, so distinct keys never share a file.
fn encode_key(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.') {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{:02X}", byte));
        }
    }
    stem
}

async fn blocking<T, F>(op: F) -> BackupResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> BackupResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| BackupError::Io(format!("Storage task failed: {}", e)))?
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn load(&self, key: &str) -> BackupResult<Option<String>> {
        let path = self.path_for(key);
        blocking(move || read_text(path)).await
    }

    async fn save(&self, key: &str, value: &str) -> BackupResult<()> {
        let path = self.path_for(key);
        let value = value.to_string();
        blocking(move || write_text_atomic(path, &value)).await
    }

    async fn remove(&self, key: &str) -> BackupResult<()> {
        let path = self.path_for(key);
        blocking(move || remove_if_exists(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("tender-backups:store"), "tender-backups_3Astore");
        assert_eq!(encode_key("tender-backup:T/1:3"), "tender-backup_3AT_2F1_3A3");
        assert_eq!(encode_key("plain.key_1"), "plain.key_5F1");
        assert_eq!(encode_key("é"), "_C3_A9");
    }

    #[test]
    fn test_lookalike_keys_get_distinct_files() {
        let store = FileKeyValueStore::new(PathBuf::from("store"));
        let keys = [
            "tender-backup:T/1:3",
            "tender-backup:T_1:3",
            "tender-backup:T:1:3",
            "tender-backup:T_2F1:3",
        ];

        let mut paths: Vec<PathBuf> = keys.iter().map(|k| store.path_for(k)).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), keys.len());
    }

    #[tokio::test]
    async fn test_lookalike_keys_do_not_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(temp_dir.path().join("store"));

        store.save("tender-backup:T/1:3", "slash").await.unwrap();
        store.save("tender-backup:T_1:3", "underscore").await.unwrap();

        assert_eq!(
            store.load("tender-backup:T/1:3").await.unwrap().as_deref(),
            Some("slash")
        );
        assert_eq!(
            store.load("tender-backup:T_1:3").await.unwrap().as_deref(),
            Some("underscore")
        );
    }

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(temp_dir.path().join("store"));

        assert_eq!(store.load("k:1").await.unwrap(), None);

        store.save("k:1", r#"{"a":1}"#).await.unwrap();
        assert!(store.path_for("k:1").exists());
        assert_eq!(store.load("k:1").await.unwrap().as_deref(), Some(r#"{"a":1}"#));

        store.remove("k:1").await.unwrap();
        store.remove("k:1").await.unwrap();
        assert_eq!(store.load("k:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("store");

        FileKeyValueStore::new(dir.clone())
            .save("key", "value")
            .await
            .unwrap();

        let reopened = FileKeyValueStore::new(dir);
        assert_eq!(reopened.load("key").await.unwrap().as_deref(), Some("value"));
    }
}
