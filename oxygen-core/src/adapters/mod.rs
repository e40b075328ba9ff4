//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the SqlHandle port
//! - Local filesystem for the FileListing port (plus the migration lock)
//! - Compiled-in tables for the FileListing port

pub mod duckdb;
pub mod embedded;
pub mod filesystem;

pub use self::duckdb::DuckDbHandle;
pub use embedded::EmbeddedListing;
pub use filesystem::{DirectoryListing, MigrationLock};
