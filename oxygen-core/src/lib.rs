//! Oxygen Core - schema migrations for OxygenFramework projects
//!
//! This crate implements the migration engine following hexagonal architecture:
//!
//! - **domain**: Migration file naming, ledger entries, reports, errors
//! - **ports**: Trait definitions for external collaborators (SqlHandle, FileListing)
//! - **services**: Ledger, runner, scaffolding and event logging
//! - **adapters**: Concrete implementations (DuckDB, filesystem, embedded files)
//! - **migration**: Migration units and the static registry
//! - **schema**: Fluent CREATE TABLE builder

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migration;
pub mod ports;
pub mod schema;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use adapters::{DirectoryListing, DuckDbHandle, MigrationLock};
use config::Config;
use services::{MigrationGenerator, MigrationObserver, MigrationRunner};

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult, Result};
pub use domain::{
    FailurePolicy, LedgerEntry, MigrateReport, MigrationFile, MigrationState, MigrationStatus,
    RollbackReport,
};
pub use migration::{Migration, MigrationRegistry, SqlMigration};
pub use ports::{QueryResult, SqlHandle};
pub use schema::{Schema, SchemaBuilder};

/// Directory inside the project that holds tool state (event log)
pub const OXYGEN_DIR: &str = ".oxygen";

/// Main context for migration commands
///
/// Holds the configuration, the database handle and the registry built from
/// the project's migrations directory.
pub struct OxygenContext {
    pub config: Config,
    pub project_dir: PathBuf,
    pub handle: Arc<DuckDbHandle>,
    pub registry: MigrationRegistry,
    pub listing: DirectoryListing,
}

impl OxygenContext {
    /// Open the project's database and register its `.sql` migrations
    pub fn new(project_dir: &Path) -> Result<Self> {
        let config = Config::load(project_dir)?;
        let handle = Arc::new(DuckDbHandle::open(&config.database_file(project_dir))?);
        Self::with_handle(project_dir, config, handle)
    }

    /// Build a context around an existing handle
    pub fn with_handle(project_dir: &Path, config: Config, handle: Arc<DuckDbHandle>) -> Result<Self> {
        let migrations_dir = config.migrations_dir(project_dir);
        let mut registry = MigrationRegistry::new();
        registry.load_sql_dir(&migrations_dir)?;

        Ok(Self {
            config,
            project_dir: project_dir.to_path_buf(),
            handle,
            registry,
            listing: DirectoryListing::new(migrations_dir),
        })
    }

    /// Runner configured from the project settings
    ///
    /// The advisory lock is only taken for file-backed databases.
    pub fn runner<'a>(&'a self, observer: &'a dyn MigrationObserver) -> MigrationRunner<'a> {
        let runner = MigrationRunner::new(self.handle.as_ref(), &self.listing, &self.registry)
            .with_table(self.config.migrations_table.clone())
            .with_policy(self.config.on_execution_error)
            .with_observer(observer);

        match self.handle.db_path() {
            Some(db_path) if self.config.lock => {
                runner.with_lock_file(MigrationLock::path_for_database(db_path))
            }
            _ => runner,
        }
    }

    pub fn generator(&self) -> MigrationGenerator {
        MigrationGenerator::new(self.config.migrations_dir(&self.project_dir))
    }

    /// `.oxygen` directory of the project
    pub fn oxygen_dir(&self) -> PathBuf {
        self.project_dir.join(OXYGEN_DIR)
    }
}
