//! SQL handle port - the connection the migration core runs against

use crate::domain::result::Result;

/// A connected SQL execution handle
///
/// The core assumes the handle is already connected; pooling, retries and
/// reconnection are the implementation's business. Data values are always
/// passed as parameters bound to `?` placeholders. Only identifiers the core
/// controls (table and column names) are interpolated into statements.
pub trait SqlHandle: Send + Sync {
    /// Execute one statement with positional parameters
    ///
    /// Row-returning statements yield their rows; write statements yield a
    /// single `affected_rows` column.
    fn execute(&self, sql: &str, params: &[serde_json::Value]) -> Result<QueryResult>;

    /// Execute a script of one or more statements without parameters
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Surrogate key produced by the most recent `INSERT ... RETURNING`
    fn last_insert_id(&self) -> Option<i64>;
}

/// Result of a SQL statement
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

impl QueryResult {
    /// First value of the first row, if any
    pub fn scalar(&self) -> Option<&serde_json::Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Number of rows changed by a write statement
    pub fn affected_rows(&self) -> u64 {
        if self.columns.len() == 1 && self.columns[0] == "affected_rows" {
            self.scalar().and_then(|v| v.as_u64()).unwrap_or(0)
        } else {
            0
        }
    }
}
