use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tender_backup::audit::AuditLogger;
use tender_backup::backup::BackupService;
use tender_backup::cli::{handle_audit_command, handle_backup_command, AuditArgs, BackupCommands};
use tender_backup::config::{paths::DATA_DIR_ENV, Settings, StorePaths};
use tender_backup::events::TOPIC_ALL;
use tender_backup::storage::FileKeyValueStore;

#[derive(Parser)]
#[command(
    name = "tender-backup",
    author = "Kaylee Beyene",
    version,
    about = "Bounded backup history for tender pricing worksheets",
    long_about = "tender-backup keeps a capped, age-limited history of pricing \
                  worksheet snapshots per tender, restores any retained snapshot, \
                  and escalates owners whose backups keep failing."
)]
struct Cli {
    /// Data directory (store, settings, audit log)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level filter; RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Backup(BackupCommands),

    /// Show recent audit log entries
    Audit(AuditArgs),

    /// Write default settings and create the data directory
    Init,

    /// Show current configuration and paths
    Config,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output (restored worksheets, exports)
    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match cli.data_dir {
        Some(dir) => StorePaths::with_base_dir(dir),
        None => StorePaths::new()?,
    };
    let settings = Settings::load_or_create(&paths)
        .with_context(|| format!("loading {}", paths.settings_file().display()))?;

    let level = cli.log_level.as_deref().unwrap_or(&settings.log_level);
    setup_logging(level, cli.json_logs);

    match cli.command {
        Commands::Backup(cmd) => {
            paths.ensure_directories()?;

            let kv = Arc::new(FileKeyValueStore::new(paths.store_dir()));
            let audit = Arc::new(AuditLogger::new(paths.audit_log()));
            let service = BackupService::new(kv, settings).with_audit_sink(audit);
            service.events().subscribe(TOPIC_ALL, |event| {
                debug!(topic = event.topic(), owner = event.owner_id(), "event published");
            });

            handle_backup_command(&service, cmd).await?;
        }
        Commands::Audit(args) => {
            let logger = AuditLogger::new(paths.audit_log());
            handle_audit_command(&logger, args)?;
        }
        Commands::Init => {
            println!("Initializing tender-backup at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            settings.save(&paths)?;
            println!("Settings written to {}", paths.settings_file().display());
        }
        Commands::Config => {
            println!("tender-backup Configuration");
            println!("===========================");
            println!("Data directory:  {}", paths.base_dir().display());
            println!("Store directory: {}", paths.store_dir().display());
            println!("Settings file:   {}", paths.settings_file().display());
            println!("Audit log:       {}", paths.audit_log().display());
            println!();
            println!("Alert threshold: {} consecutive failure(s)", settings.alert_threshold);
            println!("Event history:   {} event(s)", settings.event_history_capacity);
            println!("Log level:       {}", settings.log_level);
            println!();
            println!("Retention rules:");
            for (dataset, rule) in &settings.retention {
                let age = rule
                    .max_age_days
                    .map(|days| format!("{} day(s)", days))
                    .unwrap_or_else(|| "unlimited".to_string());
                println!("  {}: keep {} backup(s), max age {}", dataset, rule.max_entries, age);
            }
        }
    }

    Ok(())
}
