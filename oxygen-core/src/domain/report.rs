//! Outcomes of migrate and rollback runs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::result::Error;

/// What the runner does when a migration's `up` is rejected mid-batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the batch; later files stay pending
    #[default]
    Abort,
    /// Record the failure and move on to the next file
    Continue,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => write!(f, "abort"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" | "stop" => Ok(FailurePolicy::Abort),
            "continue" | "skip" => Ok(FailurePolicy::Continue),
            other => Err(Error::Config(format!(
                "unknown failure policy '{}' (expected 'abort' or 'continue')",
                other
            ))),
        }
    }
}

/// A migration the runner passed over without touching the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMigration {
    pub migration: String,
    pub reason: String,
}

/// A migration whose `up` or `down` was rejected by the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMigration {
    pub migration: String,
    pub error: String,
}

/// Result of `migrate()`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateReport {
    /// Batch number used for this run, `None` when nothing was pending
    pub batch: Option<i64>,
    /// Number of pending migrations found before the run
    pub pending: usize,
    /// Names applied, in application order
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedMigration>,
    pub failed: Vec<FailedMigration>,
    /// Pending migrations left untouched because the batch was aborted
    pub not_attempted: Vec<String>,
}

impl MigrateReport {
    pub fn nothing_to_migrate(&self) -> bool {
        self.pending == 0
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of `rollback()`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    /// Batch that was rolled back, `None` when the ledger was empty
    pub batch: Option<i64>,
    /// Names reverted, most recently applied first
    pub rolled_back: Vec<String>,
    pub skipped: Vec<SkippedMigration>,
    /// Rollback stops at the first failing `down`
    pub failed: Option<FailedMigration>,
}

impl RollbackReport {
    pub fn nothing_to_rollback(&self) -> bool {
        self.batch.is_none()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Nothing was reverted and skipped entries keep the batch in the ledger,
    /// so every later rollback targets the same batch again
    pub fn is_stuck(&self) -> bool {
        self.batch.is_some()
            && self.rolled_back.is_empty()
            && self.failed.is_none()
            && !self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("abort".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert_eq!(" Continue ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Continue);
        assert!("retry".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::default(), FailurePolicy::Abort);
    }

    #[test]
    fn test_report_flags() {
        let report = MigrateReport::default();
        assert!(report.nothing_to_migrate());
        assert!(report.is_success());

        let report = RollbackReport {
            batch: Some(2),
            failed: Some(FailedMigration {
                migration: "2024_01_01_000000_create_users_table".to_string(),
                error: "boom".to_string(),
            }),
            ..Default::default()
        };
        assert!(!report.nothing_to_rollback());
        assert!(!report.is_success());
        assert!(!report.is_stuck());
    }

    #[test]
    fn test_rollback_stuck_on_skipped_entries() {
        let skipped = vec![SkippedMigration {
            migration: "2024_01_02_000000_create_posts_table".to_string(),
            reason: "no migration registered as 'CreatePostsTable'".to_string(),
        }];

        let stuck = RollbackReport {
            batch: Some(1),
            skipped: skipped.clone(),
            ..Default::default()
        };
        assert!(stuck.is_success());
        assert!(stuck.is_stuck());

        let progressed = RollbackReport {
            batch: Some(1),
            rolled_back: vec!["2024_01_01_000000_create_users_table".to_string()],
            skipped,
            ..Default::default()
        };
        assert!(!progressed.is_stuck());
        assert!(!RollbackReport::default().is_stuck());
    }
}
