//! Migration runner - applies and reverts batches of migrations
//!
//! `migrate()` applies every discovered file that has no ledger entry, all
//! under one new batch number. `rollback()` reverts exactly the most recent
//! batch, newest entry first. Each file's apply and ledger insert is its own
//! unit: nothing spans a whole batch, so a failed run leaves the ledger
//! recording exactly the migrations that went through.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::adapters::MigrationLock;
use crate::domain::ledger::{MigrationState, MigrationStatus};
use crate::domain::migration_file::MigrationFile;
use crate::domain::report::{
    FailedMigration, FailurePolicy, MigrateReport, RollbackReport, SkippedMigration,
};
use crate::domain::result::{Error, MigrationDirection, Result};
use crate::migration::MigrationRegistry;
use crate::ports::{FileListing, SqlHandle};

use super::ledger::{MigrationLedger, DEFAULT_TABLE};

/// Progress notifications emitted while the runner works
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MigrationEvent {
    FilesFound { count: usize },
    AlreadyRan { count: usize },
    PendingFound { count: usize },
    NothingToMigrate,
    InvalidFileName { file: String, reason: String },
    Resolved { migration: String, identifier: String },
    Migrating { migration: String },
    Migrated { migration: String, batch: i64 },
    Skipped { migration: String, reason: String },
    Failed { migration: String, error: String },
    NothingToRollback,
    RollingBack { batch: i64, count: usize },
    RolledBack { migration: String },
}

/// Receives runner progress
pub trait MigrationObserver {
    fn on_event(&self, _event: &MigrationEvent) {}
}

/// Observer that ignores every event
pub struct SilentObserver;

impl MigrationObserver for SilentObserver {}

static SILENT: SilentObserver = SilentObserver;

/// Wrap a unit failure as an execution error for `migration`
fn execution_error(err: Error, migration: &str, direction: MigrationDirection) -> Error {
    match err {
        Error::Execution { .. } => err,
        Error::Database(message) => Error::execution(migration, direction, message),
        other => Error::execution(migration, direction, other.to_string()),
    }
}

/// Runs migrations against a SQL handle
pub struct MigrationRunner<'a> {
    handle: &'a dyn SqlHandle,
    listing: &'a dyn FileListing,
    registry: &'a MigrationRegistry,
    table: String,
    policy: FailurePolicy,
    observer: &'a dyn MigrationObserver,
    lock_file: Option<PathBuf>,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(
        handle: &'a dyn SqlHandle,
        listing: &'a dyn FileListing,
        registry: &'a MigrationRegistry,
    ) -> Self {
        Self {
            handle,
            listing,
            registry,
            table: DEFAULT_TABLE.to_string(),
            policy: FailurePolicy::default(),
            observer: &SILENT,
            lock_file: None,
        }
    }

    /// Keep the ledger in `table` instead of `migrations`
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn MigrationObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Hold an exclusive lock on `path` while migrating or rolling back
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn lock_file(&self) -> Option<&Path> {
        self.lock_file.as_deref()
    }

    fn emit(&self, event: MigrationEvent) {
        self.observer.on_event(&event);
    }

    fn acquire_lock(&self) -> Result<Option<MigrationLock>> {
        self.lock_file
            .as_deref()
            .map(MigrationLock::acquire)
            .transpose()
    }

    /// List, filter, parse and sort the migration files
    ///
    /// Non-`.sql` entries are ignored silently. Malformed names are reported
    /// and left out.
    fn discover(&self) -> Result<Vec<MigrationFile>> {
        let mut files: Vec<MigrationFile> = Vec::new();
        for file_name in self.listing.list()? {
            if !MigrationFile::is_migration_file(&file_name) {
                continue;
            }
            match MigrationFile::from_file_name(&file_name) {
                Ok(file) => files.push(file),
                Err(e) => self.emit(MigrationEvent::InvalidFileName {
                    file: file_name,
                    reason: e.to_string(),
                }),
            }
        }
        files.sort();
        files.dedup_by(|a, b| a.name() == b.name());
        Ok(files)
    }

    /// Apply every pending migration under a new batch number
    pub fn migrate(&self) -> Result<MigrateReport> {
        let _lock = self.acquire_lock()?;
        let ledger = MigrationLedger::with_table(self.handle, &self.table)?;

        let files = self.discover()?;
        self.emit(MigrationEvent::FilesFound { count: files.len() });

        let ran: HashSet<String> = ledger.all_names()?.into_iter().collect();
        self.emit(MigrationEvent::AlreadyRan { count: ran.len() });

        let pending: Vec<MigrationFile> = files
            .into_iter()
            .filter(|file| !ran.contains(file.name()))
            .collect();
        self.emit(MigrationEvent::PendingFound {
            count: pending.len(),
        });

        let mut report = MigrateReport {
            pending: pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            self.emit(MigrationEvent::NothingToMigrate);
            return Ok(report);
        }

        let batch = ledger.max_batch()? + 1;
        report.batch = Some(batch);

        let mut remaining = pending.iter();
        while let Some(file) = remaining.next() {
            let name = file.name().to_string();

            let unit = match self.registry.resolve(file) {
                Ok(unit) => unit,
                Err(e) if e.is_recoverable() => {
                    let reason = e.to_string();
                    self.emit(MigrationEvent::Skipped {
                        migration: name.clone(),
                        reason: reason.clone(),
                    });
                    report.skipped.push(SkippedMigration {
                        migration: name,
                        reason,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.emit(MigrationEvent::Resolved {
                migration: name.clone(),
                identifier: file.identifier(),
            });
            self.emit(MigrationEvent::Migrating {
                migration: name.clone(),
            });

            if let Err(e) = unit.up(self.handle) {
                let error = execution_error(e, &name, MigrationDirection::Up).to_string();
                self.emit(MigrationEvent::Failed {
                    migration: name.clone(),
                    error: error.clone(),
                });
                report.failed.push(FailedMigration {
                    migration: name,
                    error,
                });
                match self.policy {
                    FailurePolicy::Abort => {
                        report.not_attempted =
                            remaining.by_ref().map(|f| f.name().to_string()).collect();
                        break;
                    }
                    FailurePolicy::Continue => continue,
                }
            }

            ledger.insert(&name, batch)?;
            self.emit(MigrationEvent::Migrated {
                migration: name.clone(),
                batch,
            });
            report.applied.push(name);
        }

        Ok(report)
    }

    /// Revert the most recent batch, newest entry first
    ///
    /// Stops at the first `down` that fails; that entry stays in the ledger.
    /// Entries whose unit is not registered are skipped and kept.
    pub fn rollback(&self) -> Result<RollbackReport> {
        let _lock = self.acquire_lock()?;
        let ledger = MigrationLedger::with_table(self.handle, &self.table)?;

        let last = ledger.max_batch()?;
        if last == 0 {
            self.emit(MigrationEvent::NothingToRollback);
            return Ok(RollbackReport::default());
        }

        let entries = ledger.entries_in_batch(last)?;
        self.emit(MigrationEvent::RollingBack {
            batch: last,
            count: entries.len(),
        });

        let mut report = RollbackReport {
            batch: Some(last),
            ..Default::default()
        };

        for entry in entries {
            let name = entry.migration;

            let resolved = MigrationFile::parse(&name).and_then(|file| self.registry.resolve(&file));
            let unit = match resolved {
                Ok(unit) => unit,
                Err(e) if e.is_recoverable() => {
                    let reason = e.to_string();
                    self.emit(MigrationEvent::Skipped {
                        migration: name.clone(),
                        reason: reason.clone(),
                    });
                    report.skipped.push(SkippedMigration {
                        migration: name,
                        reason,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Err(e) = unit.down(self.handle) {
                let error = execution_error(e, &name, MigrationDirection::Down).to_string();
                self.emit(MigrationEvent::Failed {
                    migration: name.clone(),
                    error: error.clone(),
                });
                report.failed = Some(FailedMigration {
                    migration: name,
                    error,
                });
                break;
            }

            ledger.delete_by_name(&name)?;
            self.emit(MigrationEvent::RolledBack {
                migration: name.clone(),
            });
            report.rolled_back.push(name);
        }

        Ok(report)
    }

    /// State of every discovered file, followed by ledger entries whose file is gone
    pub fn status(&self) -> Result<Vec<MigrationStatus>> {
        let ledger = MigrationLedger::with_table(self.handle, &self.table)?;
        let files = self.discover()?;
        let entries = ledger.entries()?;

        let by_name: HashMap<&str, _> = entries
            .iter()
            .map(|entry| (entry.migration.as_str(), entry))
            .collect();
        let file_names: HashSet<&str> = files.iter().map(|f| f.name()).collect();

        let mut statuses: Vec<MigrationStatus> = files
            .iter()
            .map(|file| {
                let state = match by_name.get(file.name()) {
                    Some(entry) => MigrationState::Applied {
                        batch: entry.batch,
                        executed_at: entry.executed_at,
                    },
                    None => MigrationState::Pending,
                };
                MigrationStatus {
                    migration: file.name().to_string(),
                    state,
                }
            })
            .collect();

        statuses.extend(
            entries
                .iter()
                .filter(|entry| !file_names.contains(entry.migration.as_str()))
                .map(|entry| MigrationStatus {
                    migration: entry.migration.clone(),
                    state: MigrationState::Missing {
                        batch: entry.batch,
                        executed_at: entry.executed_at,
                    },
                }),
        );

        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::adapters::DuckDbHandle;
    use crate::migration::SqlMigration;

    struct Files(Vec<&'static str>);

    impl FileListing for Files {
        fn list(&self) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<MigrationEvent>>);

    impl MigrationObserver for Recorder {
        fn on_event(&self, event: &MigrationEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    fn registry() -> MigrationRegistry {
        let mut registry = MigrationRegistry::new();
        registry
            .register(
                "CreateUsersTable",
                SqlMigration::new("CREATE TABLE users (id INTEGER)", "DROP TABLE users"),
            )
            .unwrap();
        registry
            .register(
                "CreatePostsTable",
                SqlMigration::new("CREATE TABLE posts (id INTEGER)", "DROP TABLE posts"),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_discovery_sorts_by_timestamp_and_ignores_noise() {
        let handle = DuckDbHandle::open_in_memory().unwrap();
        let listing = Files(vec![
            "2024_01_02_000000_create_posts_table.sql",
            "README.md",
            "create_comments.sql",
            "2024_01_01_000000_create_users_table.sql",
        ]);
        let registry = registry();
        let recorder = Recorder::default();
        let runner = MigrationRunner::new(&handle, &listing, &registry).with_observer(&recorder);

        let report = runner.migrate().unwrap();
        assert_eq!(
            report.applied,
            vec![
                "2024_01_01_000000_create_users_table",
                "2024_01_02_000000_create_posts_table",
            ]
        );

        let events = recorder.0.borrow();
        assert!(events.contains(&MigrationEvent::FilesFound { count: 2 }));
        assert!(events
            .iter()
            .any(|e| matches!(e, MigrationEvent::InvalidFileName { file, .. } if file == "create_comments.sql")));
    }

    #[test]
    fn test_nothing_to_migrate_emits_event() {
        let handle = DuckDbHandle::open_in_memory().unwrap();
        let listing = Files(vec![]);
        let registry = MigrationRegistry::new();
        let recorder = Recorder::default();
        let runner = MigrationRunner::new(&handle, &listing, &registry).with_observer(&recorder);

        let report = runner.migrate().unwrap();
        assert!(report.nothing_to_migrate());
        assert_eq!(report.batch, None);
        assert_eq!(
            recorder.0.borrow().last(),
            Some(&MigrationEvent::NothingToMigrate)
        );
    }

    #[test]
    fn test_execution_error_wrapping() {
        let err = execution_error(
            Error::database("Catalog Error: Table with name users does not exist!"),
            "2024_01_01_000000_create_users_table",
            MigrationDirection::Down,
        );
        match err {
            Error::Execution {
                migration,
                direction,
                message,
            } => {
                assert_eq!(migration, "2024_01_01_000000_create_users_table");
                assert_eq!(direction, MigrationDirection::Down);
                assert!(message.starts_with("Catalog Error"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let value = serde_json::to_value(MigrationEvent::Migrated {
            migration: "2024_01_01_000000_create_users_table".to_string(),
            batch: 1,
        })
        .unwrap();
        assert_eq!(value["event"], "migrated");
        assert_eq!(value["batch"], 1);
    }
}
