//! DuckDB implementation of the SQL handle port

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use duckdb::types::{TimeUnit, ValueRef};
use duckdb::Connection;

use crate::domain::result::{Error, Result};
use crate::ports::{QueryResult, SqlHandle};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Statements whose first keyword means they produce rows
const ROW_RETURNING_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "DESCRIBE", "SHOW", "PRAGMA", "EXPLAIN", "VALUES", "FROM",
];

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Error::Database(e.to_string())
    }
}

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Whether a statement yields rows when executed
fn returns_rows(sql: &str) -> bool {
    let upper = sql.trim().to_uppercase();
    let first_word = upper.split_whitespace().next().unwrap_or("");
    ROW_RETURNING_KEYWORDS.contains(&first_word)
        || upper
            .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
            .any(|w| w == "RETURNING")
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .map(|w| w.eq_ignore_ascii_case("INSERT"))
        .unwrap_or(false)
}

/// DuckDB-backed SQL handle
pub struct DuckDbHandle {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    last_insert_id: Mutex<Option<i64>>,
}

impl DuckDbHandle {
    /// Open (or create) a database file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when another process holds the database open.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                        last_insert_id: Mutex::new(None),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        // Exponential backoff: 50ms, 100ms, 200ms, 400ms
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[oxygen] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    // Non-retryable error or max retries reached
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!(
                "Failed to open database after {} retries",
                MAX_RETRIES
            ))
        }))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
            last_insert_id: Mutex::new(None),
        })
    }

    /// Attempt to open a database connection (called by open() with retry logic)
    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Disable extension autoloading so nothing is fetched at runtime
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)?;
        Ok(conn)
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Connection lock poisoned: {}", e)))
    }

    /// Convert JSON value to DuckDB parameter
    fn json_to_duckdb_param(value: &serde_json::Value) -> Box<dyn duckdb::ToSql> {
        match value {
            serde_json::Value::Null => Box::new(None::<String>),
            serde_json::Value::Bool(b) => Box::new(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Box::new(i)
                } else if let Some(f) = n.as_f64() {
                    Box::new(f)
                } else {
                    Box::new(n.to_string())
                }
            }
            serde_json::Value::String(s) => Box::new(s.clone()),
            // Arrays and objects are stored as their JSON text
            other => Box::new(other.to_string()),
        }
    }

    fn get_column_value(row: &duckdb::Row, idx: usize) -> serde_json::Value {
        // Use get_ref to get the raw ValueRef, which covers every scalar type
        match row.get_ref(idx) {
            Ok(ValueRef::Null) => serde_json::Value::Null,
            Ok(ValueRef::Boolean(b)) => serde_json::Value::Bool(b),
            Ok(ValueRef::TinyInt(i)) => serde_json::json!(i),
            Ok(ValueRef::SmallInt(i)) => serde_json::json!(i),
            Ok(ValueRef::Int(i)) => serde_json::json!(i),
            Ok(ValueRef::BigInt(i)) => serde_json::json!(i),
            Ok(ValueRef::HugeInt(i)) => match i64::try_from(i) {
                Ok(v) => serde_json::json!(v),
                Err(_) => serde_json::json!(i.to_string()),
            },
            Ok(ValueRef::UTinyInt(i)) => serde_json::json!(i),
            Ok(ValueRef::USmallInt(i)) => serde_json::json!(i),
            Ok(ValueRef::UInt(i)) => serde_json::json!(i),
            Ok(ValueRef::UBigInt(i)) => serde_json::json!(i),
            Ok(ValueRef::Float(f)) => serde_json::json!(f),
            Ok(ValueRef::Double(f)) => serde_json::json!(f),
            Ok(ValueRef::Decimal(d)) => {
                let s = d.to_string();
                match s.parse::<f64>() {
                    Ok(f) => serde_json::json!(f),
                    Err(_) => serde_json::Value::String(s),
                }
            }
            Ok(ValueRef::Text(bytes)) => {
                serde_json::Value::String(String::from_utf8_lossy(bytes).to_string())
            }
            Ok(ValueRef::Blob(bytes)) => {
                serde_json::Value::String(format!("<blob {} bytes>", bytes.len()))
            }
            Ok(ValueRef::Date32(d)) => {
                // Days since epoch
                let date = chrono::DateTime::from_timestamp(i64::from(d) * 86_400, 0)
                    .map(|dt| dt.date_naive().to_string())
                    .unwrap_or_else(|| d.to_string());
                serde_json::Value::String(date)
            }
            Ok(ValueRef::Timestamp(unit, ts)) => {
                let micros = match unit {
                    TimeUnit::Second => ts.saturating_mul(1_000_000),
                    TimeUnit::Millisecond => ts.saturating_mul(1_000),
                    TimeUnit::Microsecond => ts,
                    TimeUnit::Nanosecond => ts / 1_000,
                };
                let dt = chrono::DateTime::from_timestamp_micros(micros)
                    .map(|dt| dt.naive_utc().to_string())
                    .unwrap_or_else(|| ts.to_string());
                serde_json::Value::String(dt)
            }
            _ => serde_json::Value::Null,
        }
    }
}

impl SqlHandle for DuckDbHandle {
    fn execute(&self, sql: &str, params: &[serde_json::Value]) -> Result<QueryResult> {
        let conn = self.lock_conn()?;

        // Convert JSON params to DuckDB params
        let duckdb_params: Vec<Box<dyn duckdb::ToSql>> =
            params.iter().map(Self::json_to_duckdb_param).collect();
        let param_refs: Vec<&dyn duckdb::ToSql> =
            duckdb_params.iter().map(|b| b.as_ref()).collect();

        let mut stmt = conn.prepare(sql)?;

        if !returns_rows(sql) {
            // Write query - return affected rows
            let affected = stmt.execute(param_refs.as_slice())?;
            return Ok(QueryResult {
                columns: vec!["affected_rows".to_string()],
                rows: vec![vec![serde_json::json!(affected)]],
                row_count: 1,
            });
        }

        let mut result_rows = stmt.query(param_refs.as_slice())?;
        let mut rows: Vec<Vec<serde_json::Value>> = Vec::new();
        let mut column_count = 0;

        while let Some(row) = result_rows.next()? {
            if rows.is_empty() {
                column_count = row.as_ref().column_count();
            }
            let row_values = (0..column_count)
                .map(|i| Self::get_column_value(row, i))
                .collect();
            rows.push(row_values);
        }

        drop(result_rows);

        let count = if column_count > 0 {
            column_count
        } else {
            stmt.column_count()
        };
        let columns: Vec<String> = (0..count)
            .map(|i| {
                stmt.column_name(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect();

        if is_insert(sql) {
            let id = rows.first().and_then(|r| r.first()).and_then(|v| v.as_i64());
            *self
                .last_insert_id
                .lock()
                .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))? = id;
        }

        let row_count = rows.len();
        Ok(QueryResult {
            columns,
            rows,
            row_count,
        })
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id.lock().ok().and_then(|id| *id)
    }
}
