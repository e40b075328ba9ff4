//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators. The migration
//! core depends only on these traits, not on concrete implementations.

mod file_listing;
mod sql_handle;

pub use file_listing::FileListing;
pub use sql_handle::{QueryResult, SqlHandle};
