//! Logs command - view the audit trail of each component

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use scs_core::adapters::DuckDbAuditLog;
use scs_core::GATEWAY_INSTANCE;

use super::get_scs_dir;
use crate::output;

/// Component whose audit log to read
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Component {
    Primary,
    Backup,
    Gateway,
}

impl Component {
    fn instance(self) -> &'static str {
        match self {
            Component::Primary => "primary",
            Component::Backup => "backup",
            Component::Gateway => GATEWAY_INSTANCE,
        }
    }
}

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent audit events
    List {
        /// Component to read
        #[arg(long, value_enum, default_value = "primary")]
        instance: Component,
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors and denied accesses
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show audit statistics and database path
    Stats {
        #[arg(long, value_enum, default_value = "primary")]
        instance: Component,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn open_log(component: Component) -> Result<DuckDbAuditLog> {
    let scs_dir = get_scs_dir()?;
    DuckDbAuditLog::open(&scs_dir, component.instance()).with_context(|| {
        format!(
            "Cannot open the {} audit log; it is locked while that component runs",
            component.instance()
        )
    })
}

fn format_timestamp(timestamp_ms: i64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands) -> Result<()> {
    match command {
        LogsCommands::List {
            instance,
            limit,
            errors,
            json,
        } => {
            let log = open_log(instance)?;
            let entries = if errors {
                log.get_errors(limit)?
            } else {
                log.get_recent(limit)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("No audit events found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Instance", "Event"]);
            for entry in entries {
                let event = if entry.is_error {
                    entry.event.red().to_string()
                } else {
                    entry.event
                };
                table.add_row(vec![format_timestamp(entry.timestamp), entry.instance, event]);
            }
            println!("{}", table);
        }
        LogsCommands::Stats { instance, json } => {
            let log = open_log(instance)?;
            let total = log.count()?;
            let errors = log.get_errors(1000)?.len();
            let db_path = log.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "instance": log.instance(),
                        "total_entries": total,
                        "error_count": errors,
                        "database_path": db_path.to_string_lossy(),
                        "database_size_bytes": size_bytes
                    })
                );
            } else {
                println!("{}", format!("Audit log: {}", log.instance()).bold());
                println!("  Total entries: {}", total);
                println!("  Errors: {}", errors);
                println!("  Database: {}", db_path.display());
                println!("  Size: {}", output::format_size(size_bytes));
            }
        }
    }

    Ok(())
}
