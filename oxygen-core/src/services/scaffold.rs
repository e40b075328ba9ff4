//! Migration scaffolding - writes new migration files from a template

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

use crate::domain::identifier::validate_table_name;
use crate::domain::migration_file::MigrationFile;
use crate::domain::result::{Error, Result};

/// A freshly written migration file
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedMigration {
    /// Ledger name (file stem)
    pub name: String,
    /// Registry identifier, e.g. `CreateUsersTable`
    pub identifier: String,
    pub path: PathBuf,
}

/// Writes migration files into a migrations directory
pub struct MigrationGenerator {
    migrations_dir: PathBuf,
}

impl MigrationGenerator {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Create a migration named after `description`, stamped with the current time
    pub fn generate(&self, description: &str, create_table: Option<&str>) -> Result<GeneratedMigration> {
        self.generate_at(description, create_table, Utc::now().naive_utc())
    }

    /// Create a migration stamped with `created_at`
    ///
    /// With `create_table`, the up section creates that table and the down
    /// section drops it. Fails if the file already exists or if another
    /// migration in the directory resolves to the same identifier.
    pub fn generate_at(
        &self,
        description: &str,
        create_table: Option<&str>,
        created_at: NaiveDateTime,
    ) -> Result<GeneratedMigration> {
        if let Some(table) = create_table {
            validate_table_name(table)?;
        }

        let name = MigrationFile::generate_name(description, created_at)?;
        let file = MigrationFile::parse(&name)?;
        let identifier = file.identifier();

        fs::create_dir_all(&self.migrations_dir)?;

        let path = self.migrations_dir.join(file.file_name());
        if path.exists() {
            return Err(Error::validation(format!(
                "{} already exists",
                path.display()
            )));
        }
        if let Some(existing) = self.find_identifier(&identifier)? {
            return Err(Error::validation(format!(
                "a migration named {} already exists: {}",
                identifier, existing
            )));
        }

        let content = render_template(&identifier, created_at, create_table);
        fs::write(&path, content)?;

        Ok(GeneratedMigration {
            name,
            identifier,
            path,
        })
    }

    fn find_identifier(&self, identifier: &str) -> Result<Option<String>> {
        for entry in fs::read_dir(&self.migrations_dir)? {
            let file_name = entry?.file_name().to_string_lossy().to_string();
            if let Ok(file) = MigrationFile::from_file_name(&file_name) {
                if file.identifier() == identifier {
                    return Ok(Some(file_name));
                }
            }
        }
        Ok(None)
    }
}

fn render_template(identifier: &str, created_at: NaiveDateTime, create_table: Option<&str>) -> String {
    let (up, down) = match create_table {
        Some(table) => (
            format!(
                "CREATE TABLE {} (\n    id INTEGER PRIMARY KEY,\n    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP\n);",
                table
            ),
            format!("DROP TABLE IF EXISTS {};", table),
        ),
        None => (
            "-- write your schema changes here".to_string(),
            "-- revert the changes made above".to_string(),
        ),
    };

    format!(
        "-- Migration: {}\n-- Created: {}\n\n-- up\n{}\n\n-- down\n{}\n",
        identifier,
        created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        up,
        down
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::SqlMigration;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_generate_creates_directory_and_file() {
        let dir = tempdir().unwrap();
        let generator = MigrationGenerator::new(dir.path().join("database").join("migrations"));

        let generated = generator
            .generate_at("CreateUsersTable", None, at(9, 30, 0))
            .unwrap();

        assert_eq!(generated.name, "2024_03_15_093000_create_users_table");
        assert_eq!(generated.identifier, "CreateUsersTable");
        assert!(generated.path.exists());

        let content = fs::read_to_string(&generated.path).unwrap();
        assert!(content.starts_with("-- Migration: CreateUsersTable\n"));
        let unit = SqlMigration::parse(&content).unwrap();
        assert_eq!(unit.up_sql(), "-- write your schema changes here");
    }

    #[test]
    fn test_create_table_template() {
        let dir = tempdir().unwrap();
        let generator = MigrationGenerator::new(dir.path());

        let generated = generator
            .generate_at("create posts table", Some("posts"), at(10, 0, 0))
            .unwrap();

        let unit = SqlMigration::parse(&fs::read_to_string(&generated.path).unwrap()).unwrap();
        assert!(unit.up_sql().starts_with("CREATE TABLE posts ("));
        assert_eq!(unit.down_sql(), "DROP TABLE IF EXISTS posts;");
    }

    #[test]
    fn test_refuses_duplicate_identifier() {
        let dir = tempdir().unwrap();
        let generator = MigrationGenerator::new(dir.path());

        generator
            .generate_at("create_users_table", None, at(9, 0, 0))
            .unwrap();
        let err = generator
            .generate_at("CreateUsersTable", None, at(9, 0, 1))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("2024_03_15_090000_create_users_table.sql");
        fs::write(&path, "-- hand written").unwrap();

        let generator = MigrationGenerator::new(dir.path());
        let err = generator
            .generate_at("create_users_table", None, at(9, 0, 0))
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "-- hand written");
    }

    #[test]
    fn test_rejects_bad_input() {
        let dir = tempdir().unwrap();
        let generator = MigrationGenerator::new(dir.path());
        assert!(generator.generate_at("!!!", None, at(9, 0, 0)).is_err());
        assert!(generator
            .generate_at("create_users", Some("users; DROP TABLE x"), at(9, 0, 0))
            .is_err());
    }
}
