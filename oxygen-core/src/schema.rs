//! Schema builder - fluent CREATE TABLE definitions
//!
//! Column fragments are kept in insertion order and rendered in that order.
//! `unique()` and `nullable()` act on the most recently appended fragment.
//! The rendered DDL is MySQL-flavoured (`ENGINE=... DEFAULT CHARSET=...`).

use crate::domain::result::{Error, Result};

pub const DEFAULT_ENGINE: &str = "InnoDB";
pub const DEFAULT_CHARSET: &str = "utf8mb4";
const DEFAULT_STRING_LENGTH: u32 = 255;

/// Definition of a single table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaBuilder {
    table: String,
    columns: Vec<String>,
    engine: String,
    charset: String,
}

impl SchemaBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            engine: DEFAULT_ENGINE.to_string(),
            charset: DEFAULT_CHARSET.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column fragments in DDL order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Override the storage engine
    pub fn engine(&mut self, engine: impl Into<String>) -> &mut Self {
        self.engine = engine.into();
        self
    }

    /// Override the default character set
    pub fn charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.charset = charset.into();
        self
    }

    fn push(&mut self, name: &str, definition: &str) -> &mut Self {
        self.columns.push(format!("`{}` {}", name, definition));
        self
    }

    /// Auto-incrementing primary key named `id`
    pub fn id(&mut self) -> &mut Self {
        self.id_named("id")
    }

    pub fn id_named(&mut self, name: &str) -> &mut Self {
        self.push(name, "INT AUTO_INCREMENT PRIMARY KEY")
    }

    /// VARCHAR(255)
    pub fn string(&mut self, name: &str) -> &mut Self {
        self.string_with_length(name, DEFAULT_STRING_LENGTH)
    }

    pub fn string_with_length(&mut self, name: &str, length: u32) -> &mut Self {
        self.push(name, &format!("VARCHAR({})", length))
    }

    pub fn text(&mut self, name: &str) -> &mut Self {
        self.push(name, "TEXT")
    }

    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.push(name, "INT")
    }

    pub fn medium(&mut self, name: &str) -> &mut Self {
        self.push(name, "MEDIUMINT")
    }

    pub fn long(&mut self, name: &str) -> &mut Self {
        self.push(name, "BIGINT")
    }

    pub fn double(&mut self, name: &str) -> &mut Self {
        self.push(name, "DOUBLE")
    }

    pub fn decimal(&mut self, name: &str) -> &mut Self {
        self.push(name, "DECIMAL")
    }

    pub fn float(&mut self, name: &str) -> &mut Self {
        self.push(name, "FLOAT")
    }

    /// TINYINT(1) defaulting to 0
    pub fn boolean(&mut self, name: &str) -> &mut Self {
        self.push(name, "TINYINT(1) DEFAULT 0")
    }

    /// `created_at` and `updated_at`, in that order
    pub fn timestamps(&mut self) -> &mut Self {
        self.push("created_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP")
            .push(
                "updated_at",
                "TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP",
            )
    }

    /// Mark the last appended column UNIQUE
    pub fn unique(&mut self) -> Result<&mut Self> {
        self.modify_last("unique", " UNIQUE")
    }

    /// Allow NULL in the last appended column
    pub fn nullable(&mut self) -> Result<&mut Self> {
        self.modify_last("nullable", " NULL")
    }

    fn modify_last(&mut self, modifier: &'static str, suffix: &str) -> Result<&mut Self> {
        let last = self
            .columns
            .last_mut()
            .ok_or(Error::EmptyColumnList(modifier))?;
        last.push_str(suffix);
        Ok(self)
    }

    /// Render the CREATE TABLE statement
    pub fn to_sql(&self) -> String {
        format!(
            "CREATE TABLE `{}` (\n    {}\n) ENGINE={} DEFAULT CHARSET={}",
            self.table,
            self.columns.join(",\n    "),
            self.engine,
            self.charset
        )
    }
}

/// Statement helpers for use inside migration units
pub struct Schema;

impl Schema {
    /// Define a table through `define` and render its CREATE TABLE statement
    ///
    /// A definition without columns is rejected rather than rendered.
    pub fn create<F>(table: &str, define: F) -> Result<String>
    where
        F: FnOnce(&mut SchemaBuilder) -> Result<()>,
    {
        let mut builder = SchemaBuilder::new(table);
        define(&mut builder)?;
        if builder.columns().is_empty() {
            return Err(Error::EmptyColumnList("create"));
        }
        Ok(builder.to_sql())
    }

    pub fn drop_if_exists(table: &str) -> String {
        format!("DROP TABLE IF EXISTS `{}`", table)
    }
}
