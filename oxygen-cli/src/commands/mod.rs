//! CLI command implementations

pub mod logs;
pub mod make_migration;
pub mod migrate;
pub mod rollback;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use oxygen_core::services::{LogEvent, LoggingService, MigrationEvent, MigrationObserver};
use oxygen_core::{OxygenContext, OXYGEN_DIR};

/// Environment variable that points the CLI at a project
pub const ENV_PROJECT_DIR: &str = "OXYGEN_PROJECT_DIR";

/// Project root from environment or the current directory
pub fn get_project_dir() -> Result<PathBuf> {
    match std::env::var(ENV_PROJECT_DIR) {
        Ok(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
        _ => std::env::current_dir().context("Could not determine the current directory"),
    }
}

/// Open the project: config, database and registered migrations
pub fn get_context() -> Result<OxygenContext> {
    let project_dir = get_project_dir()?;
    OxygenContext::new(&project_dir).context("Failed to initialize project context")
}

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let oxygen_dir = get_project_dir().ok()?.join(OXYGEN_DIR);
    std::fs::create_dir_all(&oxygen_dir).ok()?;
    LoggingService::new(&oxygen_dir, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Prints runner progress and mirrors outcomes into the event log
///
/// In JSON mode nothing is printed, so stdout stays machine readable.
pub struct ProgressObserver<'a> {
    command: &'static str,
    quiet: bool,
    logger: &'a Option<LoggingService>,
}

impl<'a> ProgressObserver<'a> {
    pub fn new(command: &'static str, quiet: bool, logger: &'a Option<LoggingService>) -> Self {
        Self {
            command,
            quiet,
            logger,
        }
    }

    fn print(&self, line: String) {
        if !self.quiet {
            println!("{}", line);
        }
    }
}

impl MigrationObserver for ProgressObserver<'_> {
    fn on_event(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::FilesFound { count } => {
                self.print(format!("Found {} migration file(s)", count).dimmed().to_string())
            }
            MigrationEvent::AlreadyRan { count } => {
                self.print(format!("{} already ran", count).dimmed().to_string())
            }
            MigrationEvent::PendingFound { count } if *count > 0 => {
                self.print(format!("{} pending", count).cyan().to_string())
            }
            MigrationEvent::InvalidFileName { file, reason } => {
                self.print(format!("{} {}: {}", "Ignoring".yellow(), file, reason.dimmed()));
                log_event(
                    self.logger,
                    LogEvent::new("invalid_migration_file")
                        .with_command(self.command)
                        .with_migration(file.clone())
                        .with_error(reason.clone()),
                );
            }
            MigrationEvent::Migrating { migration } => {
                self.print(format!("{} {}", "Migrating:".yellow(), migration))
            }
            MigrationEvent::Migrated { migration, batch } => {
                self.print(format!("{} {}", "Migrated: ".green(), migration));
                log_event(
                    self.logger,
                    LogEvent::new("migration_applied")
                        .with_command(self.command)
                        .with_migration(migration.clone())
                        .with_batch(*batch),
                );
            }
            MigrationEvent::RollingBack { batch, count } => self.print(
                format!("Rolling back batch {} ({} migration(s))", batch, count)
                    .cyan()
                    .to_string(),
            ),
            MigrationEvent::RolledBack { migration } => {
                self.print(format!("{} {}", "Rolled back:".green(), migration));
                log_event(
                    self.logger,
                    LogEvent::new("migration_rolled_back")
                        .with_command(self.command)
                        .with_migration(migration.clone()),
                );
            }
            MigrationEvent::Skipped { migration, reason } => {
                self.print(format!("{} {} ({})", "Skipped:  ".yellow(), migration, reason.dimmed()));
                log_event(
                    self.logger,
                    LogEvent::new("migration_skipped")
                        .with_command(self.command)
                        .with_migration(migration.clone())
                        .with_error(reason.clone()),
                );
            }
            MigrationEvent::Failed { migration, error } => {
                self.print(format!("{} {}", "Failed:   ".red(), migration));
                self.print(format!("  {}", error.red()));
                log_event(
                    self.logger,
                    LogEvent::new("migration_failed")
                        .with_command(self.command)
                        .with_migration(migration.clone())
                        .with_error(error.clone()),
                );
            }
            _ => {}
        }
    }
}
