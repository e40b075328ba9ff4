//! Migration file naming
//!
//! A migration file is named `<year>_<month>_<day>_<time>_<description>.sql`,
//! e.g. `2024_01_01_000000_create_users_table.sql`. The four numeric tokens
//! give the global ordering; the description, converted to PascalCase,
//! identifies the migration unit in the registry. Scaffolding must produce
//! names in exactly this shape.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

/// Extension of migration files on disk
pub const MIGRATION_EXTENSION: &str = "sql";

const FILE_NAME_PATTERN: &str = r"^(\d{4})_(\d{2})_(\d{2})_(\d{6})_([A-Za-z0-9]+(?:_[A-Za-z0-9]+)*)$";

fn file_name_regex() -> Result<Regex> {
    Regex::new(FILE_NAME_PATTERN).map_err(|e| Error::Other(e.to_string()))
}

/// A discovered migration file
///
/// Immutable once parsed. Equality and ordering follow the sequence key,
/// then the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MigrationFile {
    name: String,
    sequence_key: u64,
    description: String,
}

impl MigrationFile {
    /// Parse a migration name (file stem, no extension)
    pub fn parse(name: &str) -> Result<Self> {
        let re = file_name_regex()?;
        let caps = re.captures(name).ok_or_else(|| {
            Error::discovery(format!(
                "'{}' does not follow <year>_<month>_<day>_<time>_<description>",
                name
            ))
        })?;

        let digits = format!("{}{}{}{}", &caps[1], &caps[2], &caps[3], &caps[4]);
        let sequence_key = digits
            .parse::<u64>()
            .map_err(|e| Error::discovery(format!("'{}': invalid timestamp: {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            sequence_key,
            description: caps[5].to_string(),
        })
    }

    /// Parse a file basename such as `2024_01_01_000000_create_users_table.sql`
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let stem = file_name
            .strip_suffix(&format!(".{}", MIGRATION_EXTENSION))
            .ok_or_else(|| {
                Error::discovery(format!(
                    "'{}' is not a .{} file",
                    file_name, MIGRATION_EXTENSION
                ))
            })?;
        Self::parse(stem)
    }

    /// Whether a basename looks like a migration file at all
    pub fn is_migration_file(file_name: &str) -> bool {
        file_name.ends_with(&format!(".{}", MIGRATION_EXTENSION)) && !file_name.starts_with('.')
    }

    /// Build a new migration name for `description` created at `created_at`
    ///
    /// The description is normalised to snake_case first, so `CreateUsersTable`,
    /// `create users table` and `create-users-table` all give the same name.
    pub fn generate_name(description: &str, created_at: NaiveDateTime) -> Result<String> {
        let snake = to_snake_case(description);
        if snake.is_empty() {
            return Err(Error::validation(format!(
                "'{}' is not a usable migration name",
                description
            )));
        }
        let name = format!("{}_{}", created_at.format("%Y_%m_%d_%H%M%S"), snake);
        // Round-trip through the parser so generated names always satisfy it
        Self::parse(&name).map(|file| file.name)
    }

    /// The ledger name (file stem)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The basename on disk
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, MIGRATION_EXTENSION)
    }

    /// Numeric timestamp prefix, e.g. `20240101000000`
    pub fn sequence_key(&self) -> u64 {
        self.sequence_key
    }

    /// The snake_case description after the timestamp
    pub fn description(&self) -> &str {
        &self.description
    }

    /// PascalCase identifier used to resolve the migration unit
    pub fn identifier(&self) -> String {
        to_pascal_case(&self.description)
    }
}

impl Ord for MigrationFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence_key
            .cmp(&other.sequence_key)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for MigrationFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// `create_users_table` -> `CreateUsersTable`
pub fn to_pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `CreateUsersTable` / `create users-table` -> `create_users_table`
pub fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut prev_lower_or_digit = false;

    for c in input.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower_or_digit && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower_or_digit = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower_or_digit = false;
        }
    }

    out.trim_end_matches('_').to_string()
}
