//! Listing for migrations compiled into the binary

use crate::domain::result::Result;
use crate::ports::FileListing;

/// Lists the file names of an embedded `(file_name, sql)` table
pub struct EmbeddedListing {
    migrations: &'static [(&'static str, &'static str)],
}

impl EmbeddedListing {
    pub fn new(migrations: &'static [(&'static str, &'static str)]) -> Self {
        Self { migrations }
    }
}

impl FileListing for EmbeddedListing {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .migrations
            .iter()
            .map(|(name, _)| name.to_string())
            .collect())
    }
}
