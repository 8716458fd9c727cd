//! Backup CLI commands
//!
//! Implements CLI commands for creating, listing, restoring, and exporting
//! backups, plus manual failure reporting.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Subcommand, ValueEnum};
use serde_json::Value;

use crate::backup::{BackupService, CreateBackupOptions, ExportSnapshot};
use crate::error::{BackupError, BackupResult};
use crate::models::{level_of, BackupSummary, FailureLevel};

/// Export output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Yaml,
}

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Back up a pricing worksheet
    Create {
        /// Owner (tender) the backup belongs to
        owner: String,

        /// Worksheet JSON file, or '-' for stdin
        #[arg(short, long)]
        payload: PathBuf,

        /// Human-readable title
        #[arg(short, long)]
        title: Option<String>,

        /// Backup time (RFC 3339); defaults to now
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// List an owner's backups, newest first
    List {
        /// Owner (tender) to list
        owner: String,

        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the worksheet stored in a backup
    Restore {
        /// Owner (tender) the backup belongs to
        owner: String,

        /// Backup ID (legacy backups use their sequence number)
        backup_id: String,

        /// Write the worksheet to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a failed backup attempt
    ReportFailure {
        /// Owner (tender) whose backup failed
        owner: String,

        /// Error message
        error: String,
    },

    /// Show owners with consecutive backup failures
    Health,

    /// Export the whole store
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Handle a backup command
pub async fn handle_backup_command(service: &BackupService, cmd: BackupCommands) -> BackupResult<()> {
    match cmd {
        BackupCommands::Create {
            owner,
            payload,
            title,
            timestamp,
        } => {
            let worksheet = read_payload(&payload)?;
            let options = CreateBackupOptions {
                owner_id: owner.clone(),
                title,
                timestamp,
                ..CreateBackupOptions::default()
            };

            let summary = match service.create(worksheet, options).await {
                Ok(summary) => summary,
                Err(e) if e.is_store_write() => {
                    report_create_failure(service, &owner, &e).await;
                    return Err(e);
                }
                Err(e) => return Err(e),
            };
            println!("Backup created: {}", summary.id);
            println!("Owner:   {}", summary.owner_id);
            println!("Title:   {}", summary.title);
            println!("Time:    {}", format_time(&summary));
            println!("Priced:  {}", format_progress(&summary));

            let retained = service.list(&summary.owner_id).await.len();
            let rule = service.settings().rule_for(summary.dataset_key);
            println!("Retained: {} of {} allowed", retained, rule.max_entries);
        }

        BackupCommands::List { owner, verbose } => {
            let backups = service.list(&owner).await;

            if backups.is_empty() {
                println!("No backups found for {}.", owner);
                println!("Create one with: tender-backup create {} --payload <file>", owner);
                return Ok(());
            }

            let heading = format!("Backups for {}", owner);
            println!("{}", heading);
            println!("{}", "=".repeat(heading.len()));
            println!();

            for (i, backup) in backups.iter().enumerate() {
                if verbose {
                    println!(
                        "{}. {}\n   ID: {}\n   Created: {}\n   Priced: {}\n   Total value: {:.2}\n   Format: v{}{}\n",
                        i + 1,
                        display_title(backup),
                        backup.id,
                        format_time(backup),
                        format_progress(backup),
                        backup.total_value,
                        backup.version,
                        backup
                            .retention_expires_at
                            .map(|at| format!("\n   Expires: {}", at.format("%Y-%m-%d %H:%M:%S UTC")))
                            .unwrap_or_default(),
                    );
                } else {
                    println!(
                        "  {}. {}  {}  {} ({})",
                        i + 1,
                        backup.id,
                        format_time(backup),
                        display_title(backup),
                        format_progress(backup),
                    );
                }
            }

            println!();
            println!("Total: {} backup(s)", backups.len());
        }

        BackupCommands::Restore {
            owner,
            backup_id,
            output,
        } => {
            let payload = service
                .restore(&owner, &backup_id)
                .await
                .ok_or_else(|| BackupError::backup_not_found(backup_id.clone()))?;

            let text = serde_json::to_string_pretty(&payload)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{}\n", text))?;
                    println!("Restored backup {} to {}", backup_id, path.display());
                }
                None => println!("{}", text),
            }
        }

        BackupCommands::ReportFailure { owner, error } => {
            let state = service.report_failure(&owner, &error).await;
            let threshold = service.settings().alert_threshold;

            println!("Failure recorded for {}", owner);
            println!("Consecutive failures: {}", state.count);
            if state.is_alerting(threshold) {
                println!("ALERT: backups for {} keep failing ({})", owner, state.last_error);
            }
        }

        BackupCommands::Health => {
            let failures = service.health().await;
            let threshold = service.settings().alert_threshold;

            if failures.is_empty() {
                println!("All owners healthy.");
                return Ok(());
            }

            println!("Backup Health");
            println!("=============");
            println!();
            for (owner, state) in &failures {
                let level = match level_of(Some(state), threshold) {
                    FailureLevel::Healthy => "healthy",
                    FailureLevel::Degraded => "degraded",
                    FailureLevel::Alerting => "ALERTING",
                };
                println!(
                    "  {} [{}] {} failure(s), last at {}: {}",
                    owner,
                    level,
                    state.count,
                    state.last_failure_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    state.last_error,
                );
            }
        }

        BackupCommands::Export { format, output } => {
            let snapshot = service.export_snapshot().await;

            match output {
                Some(path) => {
                    let file = File::create(&path).map_err(|e| {
                        BackupError::Export(format!("Failed to create {}: {}", path.display(), e))
                    })?;
                    let mut writer = BufWriter::new(file);
                    write_export(&snapshot, format, &mut writer)?;
                    writer.flush()?;
                    println!(
                        "Exported {} backup(s) for {} owner(s) to {}",
                        snapshot.totals.entries,
                        snapshot.totals.owners,
                        path.display()
                    );
                }
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    write_export(&snapshot, format, &mut handle)?;
                }
            }
        }
    }

    Ok(())
}

/// Count a failed create against `owner` and warn on stderr
async fn report_create_failure(service: &BackupService, owner: &str, error: &BackupError) {
    let state = service.report_failure(owner, &error.to_string()).await;

    eprintln!("Backup failed for {}", owner);
    eprintln!("Consecutive failures: {}", state.count);
    if state.is_alerting(service.settings().alert_threshold) {
        eprintln!("ALERT: backups for {} keep failing ({})", owner, state.last_error);
    }
}

fn write_export<W: Write>(
    snapshot: &ExportSnapshot,
    format: ExportFormat,
    writer: &mut W,
) -> BackupResult<()> {
    match format {
        ExportFormat::Json => snapshot.write_json(writer),
        ExportFormat::Yaml => snapshot.write_yaml(writer),
    }
}

fn read_payload(path: &Path) -> BackupResult<Value> {
    let text = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path).map_err(|e| {
            BackupError::Io(format!("Failed to read payload {}: {}", path.display(), e))
        })?
    };

    serde_json::from_str(&text)
        .map_err(|e| BackupError::Validation(format!("Payload is not valid JSON: {}", e)))
}

fn display_title(backup: &BackupSummary) -> &str {
    if backup.title.is_empty() {
        "(untitled)"
    } else {
        &backup.title
    }
}

fn format_time(backup: &BackupSummary) -> String {
    backup.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_progress(backup: &BackupSummary) -> String {
    format!(
        "{:.2}% ({}/{} items)",
        backup.completion_percentage, backup.items_priced, backup.items_total
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::storage::{KeyValueStore, MemoryKeyValueStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Refuses any write that carries a backup of the poisoned worksheet
    #[derive(Default)]
    struct PoisonedStore {
        inner: MemoryKeyValueStore,
    }

    #[async_trait]
    impl KeyValueStore for PoisonedStore {
        async fn load(&self, key: &str) -> BackupResult<Option<String>> {
            self.inner.load(key).await
        }

        async fn save(&self, key: &str, value: &str) -> BackupResult<()> {
            if value.contains("poisoned") {
                return Err(BackupError::StoreWrite("disk-full".into()));
            }
            self.inner.save(key, value).await
        }

        async fn remove(&self, key: &str) -> BackupResult<()> {
            self.inner.remove(key).await
        }
    }

    fn create_cmd(owner: &str, payload: PathBuf) -> BackupCommands {
        BackupCommands::Create {
            owner: owner.to_string(),
            payload,
            title: None,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_failed_create_escalates() {
        let temp_dir = TempDir::new().unwrap();
        let payload = temp_dir.path().join("sheet.json");
        std::fs::write(&payload, r#"{"items": [], "note": "poisoned"}"#).unwrap();

        let service = BackupService::new(Arc::new(PoisonedStore::default()), Settings::default());

        let err = handle_backup_command(&service, create_cmd("T-ERR", payload.clone()))
            .await
            .unwrap_err();
        assert!(err.is_store_write());
        assert_eq!(service.failure_level("T-ERR").await, FailureLevel::Degraded);

        handle_backup_command(&service, create_cmd("T-ERR", payload))
            .await
            .unwrap_err();
        assert_eq!(service.health().await["T-ERR"].count, 2);
        assert_eq!(service.failure_level("T-ERR").await, FailureLevel::Alerting);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_not_counted() {
        let temp_dir = TempDir::new().unwrap();
        let payload = temp_dir.path().join("bad.json");
        std::fs::write(&payload, "not json").unwrap();

        let service = BackupService::new(Arc::new(PoisonedStore::default()), Settings::default());

        let err = handle_backup_command(&service, create_cmd("T-1", payload))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(service.health().await.is_empty());
    }
}
