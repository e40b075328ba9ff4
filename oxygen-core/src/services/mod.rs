//! Service layer - migration orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod ledger;
pub mod logging;
pub mod runner;
mod scaffold;

pub use ledger::MigrationLedger;
pub use logging::{LogEntry, LogEvent, LoggingService};
pub use runner::{MigrationEvent, MigrationObserver, MigrationRunner, SilentObserver};
pub use scaffold::{GeneratedMigration, MigrationGenerator};
