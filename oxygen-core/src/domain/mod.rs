//! Core domain types
//!
//! Pure data structures and naming rules - no I/O.

pub mod identifier;
pub mod ledger;
pub mod migration_file;
pub mod report;
pub mod result;

pub use ledger::{LedgerEntry, MigrationState, MigrationStatus};
pub use migration_file::MigrationFile;
pub use report::{FailedMigration, FailurePolicy, MigrateReport, RollbackReport, SkippedMigration};
pub use result::MigrationDirection;
