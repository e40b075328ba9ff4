//! Logging service - structured event logging to DuckDB
//!
//! Stores command and migration events in `logs.duckdb` inside the
//! project's `.oxygen` directory. Only event names, migration names, batch
//! numbers and error text are recorded, never table data.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapters::{DuckDbHandle, EmbeddedListing};
use crate::domain::result::{Error, Result};
use crate::log_migrations::{LOG_MIGRATIONS, LOG_MIGRATIONS_TABLE};
use crate::migration::MigrationRegistry;
use crate::ports::SqlHandle;

use super::runner::MigrationRunner;

/// File name of the event log database
pub const LOG_DATABASE: &str = "logs.duckdb";

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> i64 {
    // Lower 16 bits hold the counter (65536 unique IDs per millisecond)
    let counter = (ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF) as i64;
    (now_ms() << 16) | counter
}

/// Current unix timestamp in milliseconds
fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            migration: None,
            batch: None,
            error_message: None,
            error_details: None,
        }
    }

    /// Set the CLI command context
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_migration(mut self, migration: impl Into<String>) -> Self {
        self.migration = Some(migration.into());
        self
    }

    pub fn with_batch(mut self, batch: i64) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: i64,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub command: Option<String>,
    pub migration: Option<String>,
    pub batch: Option<i64>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

const ENTRY_COLUMNS: &str = "id, timestamp, app_version, platform, event, command, migration, batch, error_message, error_details";

fn opt_string(value: &Value) -> Option<String> {
    value.as_str().map(String::from)
}

fn entry_from_row(row: &[Value]) -> Result<LogEntry> {
    if row.len() < 10 {
        return Err(Error::database("log row has too few columns"));
    }
    let int = |v: &Value| {
        v.as_i64()
            .ok_or_else(|| Error::database(format!("expected an integer, got {}", v)))
    };
    Ok(LogEntry {
        id: int(&row[0])?,
        timestamp: int(&row[1])?,
        app_version: opt_string(&row[2]).unwrap_or_default(),
        platform: opt_string(&row[3]).unwrap_or_default(),
        event: opt_string(&row[4]).unwrap_or_default(),
        command: opt_string(&row[5]),
        migration: opt_string(&row[6]),
        batch: row[7].as_i64(),
        error_message: opt_string(&row[8]),
        error_details: opt_string(&row[9]),
    })
}

/// Service for structured event logging
pub struct LoggingService {
    handle: DuckDbHandle,
    db_path: PathBuf,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create logs.duckdb in `oxygen_dir` and bring its schema up to date
    pub fn new(oxygen_dir: &Path, app_version: impl Into<String>) -> Result<Self> {
        let db_path = oxygen_dir.join(LOG_DATABASE);
        let handle = DuckDbHandle::open(&db_path)?;

        let service = Self {
            handle,
            db_path,
            app_version: app_version.into(),
            platform: detect_platform(),
        };

        service.run_migrations()?;

        Ok(service)
    }

    fn run_migrations(&self) -> Result<()> {
        let listing = EmbeddedListing::new(LOG_MIGRATIONS);
        let registry = MigrationRegistry::from_embedded(LOG_MIGRATIONS)?;
        let report = MigrationRunner::new(&self.handle, &listing, &registry)
            .with_table(LOG_MIGRATIONS_TABLE)
            .migrate()?;

        match report.failed.into_iter().next() {
            Some(failed) => Err(Error::database(failed.error)),
            None => Ok(()),
        }
    }

    /// Record an event
    ///
    /// App version and platform are filled in from the service.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        self.handle.execute(
            &format!(
                "INSERT INTO sys_logs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                ENTRY_COLUMNS
            ),
            &[
                json!(generate_id()),
                json!(now_ms()),
                json!(self.app_version),
                json!(self.platform),
                json!(event.event),
                json!(event.command),
                json!(event.migration),
                json!(event.batch),
                json!(event.error_message),
                json!(event.error_details),
            ],
        )?;
        Ok(())
    }

    /// Most recent entries first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query_entries(
            &format!(
                "SELECT {} FROM sys_logs ORDER BY timestamp DESC, id DESC LIMIT ?",
                ENTRY_COLUMNS
            ),
            limit,
        )
    }

    /// Most recent entries that carry an error
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query_entries(
            &format!(
                "SELECT {} FROM sys_logs WHERE error_message IS NOT NULL ORDER BY timestamp DESC, id DESC LIMIT ?",
                ENTRY_COLUMNS
            ),
            limit,
        )
    }

    fn query_entries(&self, sql: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let result = self.handle.execute(sql, &[json!(limit as i64)])?;
        result.rows.iter().map(|row| entry_from_row(row)).collect()
    }

    pub fn count(&self) -> Result<u64> {
        let result = self.handle.execute("SELECT COUNT(*) FROM sys_logs", &[])?;
        Ok(result.scalar().and_then(|v| v.as_u64()).unwrap_or(0))
    }

    /// Delete logs older than the given unix timestamp (ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let result = self
            .handle
            .execute("DELETE FROM sys_logs WHERE timestamp < ?", &[json!(timestamp_ms)])?;
        Ok(result.affected_rows())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
