//! Migration units and the registry that resolves them

mod registry;
mod unit;

pub use registry::MigrationRegistry;
pub use unit::{Migration, SqlMigration};
