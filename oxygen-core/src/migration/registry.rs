//! Static registry of migration units
//!
//! Maps PascalCase identifiers (derived from migration file names) to their
//! units. Populated explicitly at startup; nothing is resolved by loading
//! code at runtime.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::domain::migration_file::MigrationFile;
use crate::domain::result::{Error, Result};

use super::unit::{Migration, SqlMigration};

#[derive(Default)]
pub struct MigrationRegistry {
    units: BTreeMap<String, Box<dyn Migration>>,
    /// Identifiers whose file could not be turned into a unit, with the reason
    rejected: BTreeMap<String, String>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit under its identifier (e.g. `CreateUsersTable`)
    pub fn register(
        &mut self,
        identifier: impl Into<String>,
        unit: impl Migration + 'static,
    ) -> Result<&mut Self> {
        self.register_boxed(identifier.into(), Box::new(unit))
    }

    fn register_boxed(&mut self, identifier: String, unit: Box<dyn Migration>) -> Result<&mut Self> {
        if self.units.contains_key(&identifier) {
            return Err(Error::validation(format!(
                "migration '{}' is already registered",
                identifier
            )));
        }
        self.units.insert(identifier, unit);
        Ok(self)
    }

    /// Build a registry from an embedded `(file_name, sql)` table
    pub fn from_embedded(migrations: &[(&str, &str)]) -> Result<Self> {
        let mut registry = Self::new();
        for (file_name, sql) in migrations {
            let file = MigrationFile::from_file_name(file_name)?;
            let unit = SqlMigration::parse(sql)
                .map_err(|e| Error::discovery(format!("{}: {}", file_name, e)))?;
            registry.register(file.identifier(), unit)?;
        }
        Ok(registry)
    }

    /// Register every parseable `.sql` file of a directory
    ///
    /// Files that cannot be read or have no `-- up` section are left
    /// unregistered and their reason is kept; the runner reports it when it
    /// tries to resolve them. Malformed names are left to discovery.
    /// Returns the identifiers that were registered.
    pub fn load_sql_dir(&mut self, dir: &Path) -> Result<Vec<String>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .collect();
        entries.sort_by_key(|entry| entry.file_name());

        let mut registered = Vec::new();
        for entry in entries {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !MigrationFile::is_migration_file(&file_name) {
                continue;
            }
            let Ok(file) = MigrationFile::from_file_name(&file_name) else {
                continue;
            };
            let identifier = file.identifier();

            let unit = fs::read_to_string(entry.path())
                .map_err(|e| format!("{}: could not read file: {}", file_name, e))
                .and_then(|content| {
                    SqlMigration::parse(&content).map_err(|e| match e {
                        Error::Discovery(msg) => format!("{}: {}", file_name, msg),
                        other => format!("{}: {}", file_name, other),
                    })
                });
            match unit {
                Ok(unit) => {
                    self.register(identifier.clone(), unit)?;
                    registered.push(identifier);
                }
                Err(reason) => {
                    self.rejected.insert(identifier, reason);
                }
            }
        }

        Ok(registered)
    }

    /// Look up the unit for a migration file
    pub fn resolve(&self, file: &MigrationFile) -> Result<&dyn Migration> {
        let identifier = file.identifier();
        self.units
            .get(&identifier)
            .map(|unit| unit.as_ref())
            .ok_or_else(|| match self.rejected.get(&identifier) {
                Some(reason) => Error::discovery(reason.clone()),
                None => Error::discovery(format!(
                    "no migration registered as '{}' for {}",
                    identifier, file
                )),
            })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.units.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = MigrationRegistry::new();
        registry
            .register("CreateUsersTable", SqlMigration::new("SELECT 1", ""))
            .unwrap();

        let file = MigrationFile::parse("2024_01_01_000000_create_users_table").unwrap();
        assert!(registry.resolve(&file).is_ok());

        let other = MigrationFile::parse("2024_01_02_000000_create_posts_table").unwrap();
        let err = registry.resolve(&other).err().unwrap();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("CreatePostsTable"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = MigrationRegistry::new();
        registry
            .register("CreateUsersTable", SqlMigration::new("", ""))
            .unwrap();
        let err = registry
            .register("CreateUsersTable", SqlMigration::new("", ""))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_embedded() {
        const EMBEDDED: &[(&str, &str)] = &[
            ("2024_01_01_000000_create_a.sql", "-- up\nCREATE TABLE a (x INT);\n-- down\nDROP TABLE a;"),
            ("2024_01_02_000000_create_b.sql", "-- up\nCREATE TABLE b (x INT);"),
        ];
        let registry = MigrationRegistry::from_embedded(EMBEDDED).unwrap();
        let ids: Vec<_> = registry.identifiers().collect();
        assert_eq!(ids, vec!["CreateA", "CreateB"]);
    }

    #[test]
    fn test_load_sql_dir_skips_unusable_files() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("2024_01_01_000000_create_users_table.sql"),
            "-- up\nCREATE TABLE users (id INTEGER);\n-- down\nDROP TABLE users;",
        )
        .unwrap();
        fs::write(
            dir.path().join("2024_01_02_000000_broken.sql"),
            "CREATE TABLE broken (id INTEGER);",
        )
        .unwrap();
        fs::write(dir.path().join("not_a_migration.sql"), "-- up\nSELECT 1;").unwrap();
        fs::write(dir.path().join("README.md"), "# migrations").unwrap();

        let mut registry = MigrationRegistry::new();
        let registered = registry.load_sql_dir(dir.path()).unwrap();

        assert_eq!(registered, vec!["CreateUsersTable"]);
        assert!(!registry.contains("Broken"));

        let broken = MigrationFile::parse("2024_01_02_000000_broken").unwrap();
        let err = registry.resolve(&broken).err().unwrap();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("missing '-- up' section"));
    }

    #[test]
    fn test_load_sql_dir_skips_unreadable_files() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("2024_01_01_000000_create_users_table.sql"),
            "-- up\nCREATE TABLE users (id INTEGER);",
        )
        .unwrap();
        // Latin-1 encoded comment, not valid UTF-8
        fs::write(
            dir.path().join("2024_01_02_000000_latin1_notes.sql"),
            b"-- up\n-- caf\xe9\nSELECT 1;".as_slice(),
        )
        .unwrap();

        let mut registry = MigrationRegistry::new();
        let registered = registry.load_sql_dir(dir.path()).unwrap();
        assert_eq!(registered, vec!["CreateUsersTable"]);

        let notes = MigrationFile::parse("2024_01_02_000000_latin1_notes").unwrap();
        let err = registry.resolve(&notes).err().unwrap();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("could not read file"));
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempdir().unwrap();
        let mut registry = MigrationRegistry::new();
        assert!(registry.load_sql_dir(&dir.path().join("missing")).unwrap().is_empty());
        assert!(registry.is_empty());
    }
}
