//! Migrate command - apply pending migrations

use anyhow::{bail, Result};
use colored::Colorize;
use oxygen_core::services::LogEvent;
use oxygen_core::OperationResult;

use super::{get_context, get_logger, log_event, ProgressObserver};
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_executed").with_command("migrate"));

    let ctx = get_context()?;
    let observer = ProgressObserver::new("migrate", json, &logger);

    let report = match ctx.runner(&observer).migrate() {
        Ok(report) => report,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("migrate_failed")
                    .with_command("migrate")
                    .with_error(e.to_string())
                    .with_error_details(format!("{:?}", e)),
            );
            return Err(e.into());
        }
    };

    if json {
        let result = if report.is_success() {
            OperationResult::ok(&report)
        } else {
            OperationResult::partial(&report, format!("{} migration(s) failed", report.failed.len()))
        };
        let result = match report.batch {
            Some(batch) => result.with_context("batch", serde_json::json!(batch)),
            None => result,
        };
        output::json(&result)?;
    } else if report.nothing_to_migrate() {
        output::info("Nothing to migrate.");
    } else {
        println!();
        if !report.applied.is_empty() {
            output::success(&format!(
                "Applied {} migration(s) in batch {}",
                report.applied.len(),
                report.batch.unwrap_or_default()
            ));
        }
        if !report.skipped.is_empty() {
            output::warning(&format!(
                "{} migration(s) skipped, see the reasons above",
                report.skipped.len()
            ));
        }
        if !report.not_attempted.is_empty() {
            output::warning(&format!(
                "{} migration(s) left pending after the failure:",
                report.not_attempted.len()
            ));
            for name in &report.not_attempted {
                println!("  {}", name.dimmed());
            }
        }
    }

    log_event(
        &logger,
        LogEvent::new("migrate_completed")
            .with_command("migrate")
            .with_batch(report.batch.unwrap_or_default()),
    );

    if !report.is_success() {
        bail!("{} migration(s) failed", report.failed.len());
    }

    Ok(())
}
