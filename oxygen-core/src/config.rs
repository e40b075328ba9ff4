//! Configuration management
//!
//! Project settings live in `oxygen.json` at the project root:
//! ```json
//! {
//!   "databasePath": "database/oxygen.duckdb",
//!   "migrationsPath": "database/migrations",
//!   "migrationsTable": "migrations",
//!   "onExecutionError": "abort",
//!   "lock": true
//! }
//! ```
//! Every field is optional and unknown keys are ignored, so the file can be
//! shared with the rest of the application's settings.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::report::FailurePolicy;
use crate::domain::result::{Error, Result};
use crate::services::ledger::DEFAULT_TABLE;

/// Name of the settings file in the project root
pub const CONFIG_FILE: &str = "oxygen.json";

pub const ENV_DB_PATH: &str = "OXYGEN_DB_PATH";
pub const ENV_MIGRATIONS_PATH: &str = "OXYGEN_MIGRATIONS_PATH";
pub const ENV_ON_ERROR: &str = "OXYGEN_ON_ERROR";

const DEFAULT_DATABASE_PATH: &str = "database/oxygen.duckdb";
const DEFAULT_MIGRATIONS_PATH: &str = "database/migrations";

/// Raw oxygen.json structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    database_path: Option<String>,
    #[serde(default)]
    migrations_path: Option<String>,
    #[serde(default)]
    migrations_table: Option<String>,
    #[serde(default)]
    on_execution_error: Option<FailurePolicy>,
    #[serde(default)]
    lock: Option<bool>,
}

/// Resolved project configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Database file, relative paths are taken from the project root
    pub database_path: PathBuf,
    /// Directory holding the `.sql` migration files
    pub migrations_path: PathBuf,
    /// Ledger table name
    pub migrations_table: String,
    pub on_execution_error: FailurePolicy,
    /// Take the advisory lock around migrate and rollback
    pub lock: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            migrations_path: PathBuf::from(DEFAULT_MIGRATIONS_PATH),
            migrations_table: DEFAULT_TABLE.to_string(),
            on_execution_error: FailurePolicy::default(),
            lock: true,
        }
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

impl Config {
    /// Load config from the project directory
    ///
    /// Environment overrides (for CI/testing):
    /// `OXYGEN_DB_PATH`, `OXYGEN_MIGRATIONS_PATH` and `OXYGEN_ON_ERROR`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let raw = read_settings(&project_dir.join(CONFIG_FILE))?;
        let defaults = Self::default();

        let mut config = Self {
            database_path: raw
                .database_path
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            migrations_path: raw
                .migrations_path
                .map(PathBuf::from)
                .unwrap_or(defaults.migrations_path),
            migrations_table: raw.migrations_table.unwrap_or(defaults.migrations_table),
            on_execution_error: raw.on_execution_error.unwrap_or_default(),
            lock: raw.lock.unwrap_or(defaults.lock),
        };

        if let Some(path) = env_var(ENV_DB_PATH) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(path) = env_var(ENV_MIGRATIONS_PATH) {
            config.migrations_path = PathBuf::from(path);
        }
        if let Some(policy) = env_var(ENV_ON_ERROR) {
            config.on_execution_error = policy.parse()?;
        }

        Ok(config)
    }

    /// Database file resolved against the project directory
    pub fn database_file(&self, project_dir: &Path) -> PathBuf {
        resolve(project_dir, &self.database_path)
    }

    /// Migrations directory resolved against the project directory
    pub fn migrations_dir(&self, project_dir: &Path) -> PathBuf {
        resolve(project_dir, &self.migrations_path)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn resolve(project_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // Environment overrides are process-wide, so these tests only touch
    // files and leave the env variables alone.

    #[test]
    fn test_defaults_without_file() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert_eq!(config.migrations_table, "migrations");
        assert_eq!(config.on_execution_error, FailurePolicy::Abort);
        assert!(config.lock);
        if std::env::var(ENV_DB_PATH).is_err() {
            assert_eq!(
                config.database_file(dir.path()),
                dir.path().join("database/oxygen.duckdb")
            );
        }
    }

    #[test]
    fn test_load_camel_case_settings() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{
                "migrationsTable": "schema_history",
                "onExecutionError": "continue",
                "lock": false
            }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.migrations_table, "schema_history");
        assert!(!config.lock);
        if std::env::var(ENV_ON_ERROR).is_err() {
            assert_eq!(config.on_execution_error, FailurePolicy::Continue);
        }
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "appName": "blog", "schema": { "engine": "MyISAM" }, "lock": false }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert!(!config.lock);
        assert_eq!(config.migrations_table, "migrations");
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let dir = tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("elsewhere.duckdb"),
            ..Config::default()
        };
        assert_eq!(
            config.database_file(Path::new("/project")),
            dir.path().join("elsewhere.duckdb")
        );
    }
}
