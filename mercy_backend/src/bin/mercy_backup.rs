use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use mercy_backend::config::TrackerConfig;
use mercy_backend::format::{format_size, format_time_ago};
use mercy_backend::Tracker;
use tracing_subscriber::EnvFilter;

/// Operator tool for the mercy tracker's backup folder.
#[derive(Parser, Debug)]
#[command(name = "mercy_backup", version, about)]
struct Cli {
    /// Config file; defaults to mercy_config.toml next to the executable
    #[arg(long, env = "MERCY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<BackupCommand>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum BackupCommand {
    /// List snapshots, newest first (default)
    List,
    /// Check that a snapshot is well-formed JSON of user counters
    Verify { name: String },
    /// Replace the data file with a snapshot; `latest` picks the newest
    Restore { name: String },
    /// Take a manual snapshot of the current data
    Snapshot { suffix: Option<String> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, source) = match &cli.config {
        Some(path) => TrackerConfig::load_from(path),
        None => TrackerConfig::load(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{},mercy_backend=debug", config.log_level))
        }))
        .init();

    tracing::info!("{}", source);
    config.validate().context("invalid tracker config")?;

    let mut tracker = Tracker::open(config);

    match cli.command.unwrap_or(BackupCommand::List) {
        BackupCommand::List => list(&tracker),
        BackupCommand::Verify { name } => {
            let report = tracker.verify_backup(&name);
            println!("{}: {}", name, report.reason);
            if !report.ok {
                bail!("backup {} failed verification", name);
            }
            Ok(())
        }
        BackupCommand::Restore { name } if name == "latest" => {
            let newest = tracker
                .list_backups()?
                .into_iter()
                .next()
                .context("no backups to restore")?;
            restore(&mut tracker, &newest.name)
        }
        BackupCommand::Restore { name } => restore(&mut tracker, &name),
        BackupCommand::Snapshot { suffix } => {
            let path = tracker.manual_backup(suffix.as_deref().unwrap_or("manual"))?;
            println!("Created {}", path.display());
            Ok(())
        }
    }
}

fn list(tracker: &Tracker) -> Result<()> {
    let snapshots = tracker.list_backups()?;
    if snapshots.is_empty() {
        println!("No backups in {}", tracker.storage().backups().folder().display());
        return Ok(());
    }

    let now = Local::now();
    for snapshot in snapshots {
        println!(
            "{}  {:>9}  {}",
            snapshot.name,
            format_size(snapshot.size_bytes),
            format_time_ago(snapshot.modified_at, now)
        );
    }
    Ok(())
}

fn restore(tracker: &mut Tracker, name: &str) -> Result<()> {
    let users = tracker
        .restore_backup(name)
        .with_context(|| format!("failed to restore {}", name))?;
    println!("Restored {} users from {}", users, name);
    Ok(())
}
