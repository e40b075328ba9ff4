//! File listing port - where migration file names come from

use crate::domain::result::Result;

/// Lists the files of a migrations location
///
/// Returns basenames only. Order is not significant: the runner sorts by
/// the timestamp embedded in each name.
pub trait FileListing {
    fn list(&self) -> Result<Vec<String>>;
}
