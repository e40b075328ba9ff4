//! Event log schema - embedded migrations
//!
//! Compiled into the binary with include_str! and applied by the regular
//! migration runner against logs.duckdb.

/// All log migrations, embedded at compile time.
/// Format: (file_name, sql_content)
///
/// When adding a migration, create `<YYYY_MM_DD_HHMMSS>_<description>.sql`
/// with `-- up` / `-- down` sections and add an entry here.
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[(
    "2024_01_01_000000_create_logs_table.sql",
    include_str!("2024_01_01_000000_create_logs_table.sql"),
)];

/// Ledger table of the log database
pub const LOG_MIGRATIONS_TABLE: &str = "sys_migrations";
