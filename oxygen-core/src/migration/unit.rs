//! Migration units: the code behind a migration file

use crate::domain::result::{Error, Result};
use crate::ports::SqlHandle;

/// A named piece of schema change with a forward and a backward half
pub trait Migration: Send + Sync {
    /// Apply the schema change
    fn up(&self, handle: &dyn SqlHandle) -> Result<()>;

    /// Revert what `up` did
    fn down(&self, handle: &dyn SqlHandle) -> Result<()>;
}

/// A migration written as plain SQL with `-- up` and `-- down` sections
///
/// ```sql
/// -- up
/// CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR);
///
/// -- down
/// DROP TABLE users;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    up_sql: String,
    down_sql: String,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Up,
    Down,
}

impl SqlMigration {
    pub fn new(up_sql: impl Into<String>, down_sql: impl Into<String>) -> Self {
        Self {
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    /// Split file content into its up and down sections
    ///
    /// Lines before the first marker are ignored. A file without an `-- up`
    /// marker is rejected.
    pub fn parse(content: &str) -> Result<Self> {
        let mut section = Section::Preamble;
        let mut seen_up = false;
        let mut up = Vec::new();
        let mut down = Vec::new();

        for line in content.lines() {
            match section_marker(line) {
                Some(marker) => {
                    seen_up |= marker == Section::Up;
                    section = marker;
                    continue;
                }
                None => match section {
                    Section::Preamble => {}
                    Section::Up => up.push(line),
                    Section::Down => down.push(line),
                },
            }
        }

        if !seen_up {
            return Err(Error::discovery("missing '-- up' section"));
        }

        Ok(Self::new(
            up.join("\n").trim().to_string(),
            down.join("\n").trim().to_string(),
        ))
    }

    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    pub fn down_sql(&self) -> &str {
        &self.down_sql
    }
}

fn section_marker(line: &str) -> Option<Section> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix("--")?.trim().to_lowercase();
    match rest.as_str() {
        "up" | "up migration" => Some(Section::Up),
        "down" | "down migration" => Some(Section::Down),
        _ => None,
    }
}

/// Whether a script has anything besides blank lines and `--` comments
fn has_statements(sql: &str) -> bool {
    sql.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with("--")
    })
}

impl Migration for SqlMigration {
    fn up(&self, handle: &dyn SqlHandle) -> Result<()> {
        if has_statements(&self.up_sql) {
            handle.execute_batch(&self.up_sql)?;
        }
        Ok(())
    }

    fn down(&self, handle: &dyn SqlHandle) -> Result<()> {
        if has_statements(&self.down_sql) {
            handle.execute_batch(&self.down_sql)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        let migration = SqlMigration::parse(
            "-- Migration: CreateUsersTable\n\
             -- Created: 2024-01-01 00:00:00 UTC\n\
             \n\
             -- up\n\
             CREATE TABLE users (id INTEGER);\n\
             -- index for lookups\n\
             CREATE INDEX idx_users_id ON users (id);\n\
             \n\
             -- Down\n\
             DROP TABLE users;\n",
        )
        .unwrap();

        assert_eq!(
            migration.up_sql(),
            "CREATE TABLE users (id INTEGER);\n-- index for lookups\nCREATE INDEX idx_users_id ON users (id);"
        );
        assert_eq!(migration.down_sql(), "DROP TABLE users;");
    }

    #[test]
    fn test_parse_without_down_section() {
        let migration = SqlMigration::parse("-- up\nCREATE TABLE t (a INT);").unwrap();
        assert_eq!(migration.down_sql(), "");
    }

    #[test]
    fn test_parse_requires_up_marker() {
        let err = SqlMigration::parse("CREATE TABLE t (a INT);\n-- down\nDROP TABLE t;").unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
    }

    #[test]
    fn test_markers_are_exact() {
        // A comment that merely mentions "up" is not a marker
        assert!(section_marker("-- set up the users table").is_none());
        assert!(section_marker("  --   UP  ").is_some());
        assert!(section_marker("-- Up migration").is_some());
    }

    #[test]
    fn test_has_statements() {
        assert!(!has_statements(""));
        assert!(!has_statements("-- write your schema changes here\n\n"));
        assert!(has_statements("-- comment\nSELECT 1;"));
    }
}
