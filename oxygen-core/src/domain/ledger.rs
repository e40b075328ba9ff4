//! Ledger entries and per-migration state

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One row of the migrations ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    /// Name of the migration file (stem), not enforced against the filesystem
    pub migration: String,
    pub batch: i64,
    /// Informational only
    pub executed_at: Option<NaiveDateTime>,
}

/// State of a migration relative to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationState {
    /// File exists, no ledger entry
    Pending,
    /// File exists and is recorded in the ledger
    Applied {
        batch: i64,
        executed_at: Option<NaiveDateTime>,
    },
    /// Recorded in the ledger but the file is gone
    Missing {
        batch: i64,
        executed_at: Option<NaiveDateTime>,
    },
}

impl MigrationState {
    pub fn label(&self) -> &'static str {
        match self {
            MigrationState::Pending => "pending",
            MigrationState::Applied { .. } => "applied",
            MigrationState::Missing { .. } => "missing",
        }
    }

    pub fn batch(&self) -> Option<i64> {
        match self {
            MigrationState::Pending => None,
            MigrationState::Applied { batch, .. } | MigrationState::Missing { batch, .. } => {
                Some(*batch)
            }
        }
    }
}

/// A migration name together with its state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub migration: String,
    #[serde(flatten)]
    pub state: MigrationState,
}
