//! DuckDB audit log
//!
//! Stores audit events in `audit-<instance>.duckdb` inside the SCS
//! directory, one file per running component since a DuckDB file admits a
//! single writing process. Implements the `AuditSink` port; write failures
//! are reported through `tracing` and never reach the caller.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::audit_migrations::AUDIT_MIGRATIONS;
use crate::ports::AuditSink;

/// Maximum number of retries when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    // Lower 16 bits: counter (65536 unique IDs per millisecond)
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

/// Current unix timestamp in milliseconds
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
        || lower.contains("file is already open")
}

fn is_error_event(event: &str) -> bool {
    event.starts_with("ERROR") || event.starts_with("ACCESS DENIED")
}

/// An audit event as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    /// Unix milliseconds
    pub timestamp: i64,
    pub instance: String,
    pub event: String,
    pub is_error: bool,
}

pub struct DuckDbAuditLog {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    instance: String,
}

impl DuckDbAuditLog {
    /// Path of the audit database for `instance` inside `scs_dir`
    pub fn db_path_for(scs_dir: &Path, instance: &str) -> PathBuf {
        scs_dir.join(format!("audit-{}.duckdb", instance))
    }

    /// Open or create the audit database for `instance` and migrate it
    pub fn open(scs_dir: &Path, instance: impl Into<String>) -> Result<Self> {
        let instance = instance.into();
        let db_path = Self::db_path_for(scs_dir, &instance);
        std::fs::create_dir_all(scs_dir)
            .with_context(|| format!("Failed to create {}", scs_dir.display()))?;
        let conn = Self::open_with_retry(&db_path)?;

        let log = Self {
            conn: Mutex::new(conn),
            db_path,
            instance,
        };
        log.run_migrations()?;
        Ok(log)
    }

    fn open_with_retry(db_path: &Path) -> Result<Connection> {
        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            match Connection::open(db_path) {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::debug!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %err_msg,
                            "audit database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e).with_context(|| {
                        format!("Failed to open audit log {}", db_path.display())
                    });
                }
            }
        }
        Err(last_error
            .map(|e| anyhow!("Audit log {} is busy: {}", db_path.display(), e))
            .unwrap_or_else(|| anyhow!("Failed to open audit log after {} retries", MAX_RETRIES)))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let table_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM information_schema.tables WHERE table_name = 'sys_migrations'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !table_exists {
            if let Some((name, sql)) = AUDIT_MIGRATIONS.iter().find(|(n, _)| *n == "000_migrations.sql") {
                conn.execute_batch(sql)?;
                conn.execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])?;
            }
        }

        let mut stmt = conn.prepare("SELECT migration_name FROM sys_migrations")?;
        let applied: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        for (name, sql) in AUDIT_MIGRATIONS.iter() {
            if *name == "000_migrations.sql" || applied.iter().any(|a| a == name) {
                continue;
            }
            conn.execute_batch(sql)?;
            conn.execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])?;
        }

        Ok(())
    }

    /// Record one event
    pub fn record(&self, event: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        conn.execute(
            "INSERT INTO audit_events (id, timestamp, instance, event, is_error) VALUES (?, ?, ?, ?, ?)",
            duckdb::params![generate_id(), now_ms(), &self.instance, event, is_error_event(event)],
        )?;
        Ok(())
    }

    /// Most recent events first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.query(
            "SELECT id, timestamp, instance, event, is_error FROM audit_events
             ORDER BY timestamp DESC, id DESC LIMIT ?",
            limit,
        )
    }

    /// Most recent failures and refusals first
    pub fn get_errors(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.query(
            "SELECT id, timestamp, instance, event, is_error FROM audit_events
             WHERE is_error ORDER BY timestamp DESC, id DESC LIMIT ?",
            limit,
        )
    }

    fn query(&self, sql: &str, limit: usize) -> Result<Vec<AuditEntry>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map([limit as i64], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    instance: row.get(2)?,
                    event: row.get(3)?,
                    is_error: row.get(4)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM audit_events", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl AuditSink for DuckDbAuditLog {
    fn log_event(&self, message: &str) {
        tracing::info!(target: "scs::audit", instance = %self.instance, "{}", message);
        if let Err(e) = self.record(message) {
            tracing::warn!(error = %e, "failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_audit_log_creation() {
        let dir = tempdir().unwrap();
        let log = DuckDbAuditLog::open(dir.path(), "primary").unwrap();
        assert!(log.db_path().exists());
        assert_eq!(log.db_path(), dir.path().join("audit-primary.duckdb"));
    }

    #[test]
    fn test_events_are_recorded_newest_first() {
        let dir = tempdir().unwrap();
        let log = DuckDbAuditLog::open(dir.path(), "primary").unwrap();

        log.log_event("SmartCard for user 'alice' created successfully.");
        log.log_event("ERROR: PIN validation failed for user 'bob'.");

        assert_eq!(log.count().unwrap(), 2);
        let recent = log.get_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].event.contains("bob"));
        assert_eq!(recent[0].instance, "primary");

        let errors = log.get_errors(10).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_error);
    }

    #[test]
    fn test_reopen_keeps_events() {
        let dir = tempdir().unwrap();
        {
            let log = DuckDbAuditLog::open(dir.path(), "gateway").unwrap();
            log.log_event("User 'alice' deposited 500. New balance: 500.");
        }
        let log = DuckDbAuditLog::open(dir.path(), "gateway").unwrap();
        assert_eq!(log.count().unwrap(), 1);
    }
}
