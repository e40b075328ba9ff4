//! SQL identifier rules
//!
//! Table names end up interpolated into DDL and queries, so only plain
//! identifiers (`[A-Za-z_][A-Za-z0-9_]*`) are accepted.

use crate::domain::result::{Error, Result};

/// Whether `name` is a plain, unquoted SQL identifier
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject table names that are not plain identifiers
pub fn validate_table_name(table: &str) -> Result<()> {
    if is_plain_identifier(table) {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid table name '{}'", table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifiers() {
        for name in ["migrations", "schema_history", "_private", "t2"] {
            assert!(is_plain_identifier(name), "{} should be accepted", name);
        }
    }

    #[test]
    fn test_rejected_identifiers() {
        for name in ["", "2fast", "users; DROP TABLE x", "my-table", "naïve", "a b"] {
            assert!(!is_plain_identifier(name), "{} should be rejected", name);
            assert!(matches!(validate_table_name(name), Err(Error::Validation(_))));
        }
    }
}
