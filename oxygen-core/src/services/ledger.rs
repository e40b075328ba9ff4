//! Migration ledger - the table that records which migrations have run
//!
//! One row per applied migration: surrogate `id`, `migration` name, `batch`
//! number and `executed_at`. A name appears at most once; it is inserted
//! when the migration is applied and deleted when it is rolled back.

use chrono::NaiveDateTime;
use serde_json::{json, Value};

use crate::domain::identifier::validate_table_name;
use crate::domain::ledger::LedgerEntry;
use crate::domain::result::{Error, Result};
use crate::ports::SqlHandle;

/// Default ledger table name
pub const DEFAULT_TABLE: &str = "migrations";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    value
        .as_str()
        .and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok())
}

fn as_i64(value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| Error::database(format!("expected an integer, got {}", value)))
}

/// Access to the ledger table through a SQL handle
pub struct MigrationLedger<'a> {
    handle: &'a dyn SqlHandle,
    table: String,
}

impl<'a> MigrationLedger<'a> {
    /// Open the default `migrations` ledger, creating it if needed
    pub fn new(handle: &'a dyn SqlHandle) -> Result<Self> {
        Self::with_table(handle, DEFAULT_TABLE)
    }

    /// Open a ledger stored in `table`, creating it if needed
    pub fn with_table(handle: &'a dyn SqlHandle, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let ledger = Self {
            handle,
            table: table.to_string(),
        };
        ledger.ensure_table()?;
        Ok(ledger)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn ensure_table(&self) -> Result<()> {
        self.handle.execute_batch(&format!(
            r#"
            CREATE SEQUENCE IF NOT EXISTS {table}_id_seq START 1;
            CREATE TABLE IF NOT EXISTS {table} (
                id BIGINT PRIMARY KEY DEFAULT nextval('{table}_id_seq'),
                migration VARCHAR NOT NULL,
                batch INTEGER NOT NULL,
                executed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            "#,
            table = self.table
        ))
    }

    /// Record `name` as applied in `batch`, returning the new entry's id
    ///
    /// `executed_at` is filled in by the column default.
    pub fn insert(&self, name: &str, batch: i64) -> Result<i64> {
        let result = self.handle.execute(
            &format!(
                "INSERT INTO {} (migration, batch) VALUES (?, ?) RETURNING id",
                self.table
            ),
            &[json!(name), json!(batch)],
        )?;

        result
            .scalar()
            .and_then(|v| v.as_i64())
            .or_else(|| self.handle.last_insert_id())
            .ok_or_else(|| Error::database(format!("no id returned for ledger entry '{}'", name)))
    }

    /// Remove the entry for `name`, returning how many rows went away
    pub fn delete_by_name(&self, name: &str) -> Result<u64> {
        let result = self.handle.execute(
            &format!("DELETE FROM {} WHERE migration = ?", self.table),
            &[json!(name)],
        )?;
        Ok(result.affected_rows())
    }

    /// Names of every applied migration, in application order
    pub fn all_names(&self) -> Result<Vec<String>> {
        let result = self.handle.execute(
            &format!("SELECT migration FROM {} ORDER BY id", self.table),
            &[],
        )?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.first().and_then(|v| v.as_str()).map(String::from))
            .collect())
    }

    /// Highest batch number, 0 when nothing has run
    pub fn max_batch(&self) -> Result<i64> {
        let result = self.handle.execute(
            &format!("SELECT COALESCE(MAX(batch), 0) FROM {}", self.table),
            &[],
        )?;
        result.scalar().map(as_i64).unwrap_or(Ok(0))
    }

    /// Entries of one batch, most recently applied first
    pub fn entries_in_batch(&self, batch: i64) -> Result<Vec<LedgerEntry>> {
        self.query_entries(
            &format!(
                "SELECT id, migration, batch, CAST(executed_at AS VARCHAR) FROM {} WHERE batch = ? ORDER BY id DESC",
                self.table
            ),
            &[json!(batch)],
        )
    }

    /// Every entry, in application order
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        self.query_entries(
            &format!(
                "SELECT id, migration, batch, CAST(executed_at AS VARCHAR) FROM {} ORDER BY id",
                self.table
            ),
            &[],
        )
    }

    fn query_entries(&self, sql: &str, params: &[Value]) -> Result<Vec<LedgerEntry>> {
        let result = self.handle.execute(sql, params)?;
        result
            .rows
            .iter()
            .map(|row| {
                if row.len() < 4 {
                    return Err(Error::database("ledger row has too few columns"));
                }
                Ok(LedgerEntry {
                    id: as_i64(&row[0])?,
                    migration: row[1]
                        .as_str()
                        .ok_or_else(|| Error::database("ledger migration name is not text"))?
                        .to_string(),
                    batch: as_i64(&row[2])?,
                    executed_at: parse_timestamp(&row[3]),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DuckDbHandle;

    #[test]
    fn test_creation_is_idempotent() {
        let handle = DuckDbHandle::open_in_memory().unwrap();
        MigrationLedger::new(&handle).unwrap();
        let ledger = MigrationLedger::new(&handle).unwrap();
        assert_eq!(ledger.table(), "migrations");
        assert_eq!(ledger.max_batch().unwrap(), 0);
        assert!(ledger.all_names().unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_query() {
        let handle = DuckDbHandle::open_in_memory().unwrap();
        let ledger = MigrationLedger::new(&handle).unwrap();

        let first = ledger.insert("2024_01_01_000000_create_users_table", 1).unwrap();
        let second = ledger.insert("2024_01_02_000000_create_posts_table", 1).unwrap();
        let third = ledger.insert("2024_01_03_000000_add_index_to_posts", 2).unwrap();
        assert!(first < second && second < third);

        assert_eq!(ledger.max_batch().unwrap(), 2);
        assert_eq!(
            ledger.all_names().unwrap(),
            vec![
                "2024_01_01_000000_create_users_table",
                "2024_01_02_000000_create_posts_table",
                "2024_01_03_000000_add_index_to_posts",
            ]
        );

        let batch_one = ledger.entries_in_batch(1).unwrap();
        let names: Vec<_> = batch_one.iter().map(|e| e.migration.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "2024_01_02_000000_create_posts_table",
                "2024_01_01_000000_create_users_table",
            ]
        );
        assert!(batch_one.iter().all(|e| e.executed_at.is_some()));
    }

    #[test]
    fn test_executed_at_defaults_to_insertion_time() {
        let handle = DuckDbHandle::open_in_memory().unwrap();
        let ledger = MigrationLedger::new(&handle).unwrap();

        // Rows written by other tools that omit the column still get a time
        handle
            .execute(
                "INSERT INTO migrations (migration, batch) VALUES (?, ?)",
                &[json!("2024_01_01_000000_create_users_table"), json!(1)],
            )
            .unwrap();
        ledger.insert("2024_01_02_000000_create_posts_table", 1).unwrap();

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.executed_at.is_some()));
    }

    #[test]
    fn test_delete_by_name() {
        let handle = DuckDbHandle::open_in_memory().unwrap();
        let ledger = MigrationLedger::new(&handle).unwrap();
        ledger.insert("2024_01_01_000000_create_users_table", 1).unwrap();

        assert_eq!(ledger.delete_by_name("2024_01_01_000000_create_users_table").unwrap(), 1);
        assert_eq!(ledger.delete_by_name("2024_01_01_000000_create_users_table").unwrap(), 0);
        assert_eq!(ledger.max_batch().unwrap(), 0);
        assert!(ledger.entries().unwrap().is_empty());
    }

    #[test]
    fn test_custom_table() {
        let handle = DuckDbHandle::open_in_memory().unwrap();
        let ledger = MigrationLedger::with_table(&handle, "schema_history").unwrap();
        ledger.insert("2024_01_01_000000_create_users_table", 1).unwrap();

        // The default ledger is a separate table
        let default = MigrationLedger::new(&handle).unwrap();
        assert!(default.all_names().unwrap().is_empty());
        assert_eq!(ledger.all_names().unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let handle = DuckDbHandle::open_in_memory().unwrap();
        let err = MigrationLedger::with_table(&handle, "migrations; DROP TABLE users")
            .err()
            .unwrap();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp(&json!("2024-01-01 12:30:00")).is_some());
        assert!(parse_timestamp(&json!("2024-01-01 12:30:00.123456")).is_some());
        assert!(parse_timestamp(&Value::Null).is_none());
    }
}
