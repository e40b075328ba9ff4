//! Rollback command - revert the most recent batch

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::Confirm;
use oxygen_core::services::{LogEvent, MigrationLedger};
use oxygen_core::{OperationResult, RollbackReport};

use super::{get_context, get_logger, log_event, ProgressObserver};
use crate::output;

pub fn run(force: bool, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(
        &logger,
        LogEvent::new("command_executed").with_command("migrate:rollback"),
    );

    let ctx = get_context()?;

    // Confirm unless --force, showing what the last batch holds
    if !force && !json {
        let ledger = MigrationLedger::with_table(ctx.handle.as_ref(), &ctx.config.migrations_table)?;
        let batch = ledger.max_batch()?;
        if batch == 0 {
            output::info("Nothing to rollback.");
            return Ok(());
        }

        println!(
            "\n{}",
            format!("This will roll back batch {}:", batch).yellow()
        );
        for entry in ledger.entries_in_batch(batch)? {
            println!("  {}", entry.migration);
        }
        println!();

        if !Confirm::new()
            .with_prompt("Are you sure?")
            .default(false)
            .interact()?
        {
            println!("{}\n", "Cancelled".dimmed());
            return Ok(());
        }
    }

    let observer = ProgressObserver::new("migrate:rollback", json, &logger);
    let report = match ctx.runner(&observer).rollback() {
        Ok(report) => report,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("rollback_failed")
                    .with_command("migrate:rollback")
                    .with_error(e.to_string())
                    .with_error_details(format!("{:?}", e)),
            );
            return Err(e.into());
        }
    };

    if json {
        let result = match &report.failed {
            Some(failed) => OperationResult::partial(&report, failed.error.clone()),
            None if report.is_stuck() => {
                OperationResult::partial(&report, stuck_message(&report))
            }
            None => OperationResult::ok(&report),
        };
        output::json(&result)?;
    } else if report.nothing_to_rollback() {
        output::info("Nothing to rollback.");
    } else if !report.is_stuck() {
        println!();
        output::success(&format!(
            "Rolled back {} migration(s) from batch {}",
            report.rolled_back.len(),
            report.batch.unwrap_or_default()
        ));
        if !report.skipped.is_empty() {
            output::warning(&format!(
                "{} migration(s) kept in the ledger: no registered unit. \
                 Batch {} stays current until they are registered or removed.",
                report.skipped.len(),
                report.batch.unwrap_or_default()
            ));
        }
    }

    if let Some(failed) = &report.failed {
        bail!("Rollback stopped at {}", failed.migration);
    }
    if report.is_stuck() {
        bail!("{}", stuck_message(&report));
    }

    Ok(())
}

fn stuck_message(report: &RollbackReport) -> String {
    format!(
        "Batch {} cannot be rolled back: {} migration(s) have no registered unit",
        report.batch.unwrap_or_default(),
        report.skipped.len()
    )
}
