//! Audit CLI commands

use clap::Args;

use crate::audit::AuditLogger;
use crate::error::BackupResult;

/// Arguments for viewing the audit log
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Number of most recent entries to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Only show entries for this owner
    #[arg(short, long)]
    pub owner: Option<String>,
}

/// Print recent audit entries, oldest first
pub fn handle_audit_command(logger: &AuditLogger, args: AuditArgs) -> BackupResult<()> {
    let mut entries = logger.read_all()?;
    if let Some(owner) = &args.owner {
        entries.retain(|entry| &entry.owner_id == owner);
    }

    if entries.is_empty() {
        println!("No audit entries found.");
        return Ok(());
    }

    let start = entries.len().saturating_sub(args.limit);
    for entry in &entries[start..] {
        println!("{}", entry.format_human_readable());
    }

    println!();
    println!("Showing {} of {} entries", entries.len() - start, entries.len());
    Ok(())
}
