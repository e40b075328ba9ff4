//! Status command - show which migrations have run

use anyhow::Result;
use colored::Colorize;
use oxygen_core::services::SilentObserver;
use oxygen_core::MigrationState;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let statuses = ctx.runner(&SilentObserver).status()?;

    if json {
        return output::json(&statuses);
    }

    if statuses.is_empty() {
        output::info("No migrations found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Migration", "Batch", "Status", "Executed at"]);

    for status in &statuses {
        let executed_at = match &status.state {
            MigrationState::Applied { executed_at, .. }
            | MigrationState::Missing { executed_at, .. } => output::format_executed_at(*executed_at),
            MigrationState::Pending => String::new(),
        };
        table.add_row(vec![
            status.migration.clone(),
            status
                .state
                .batch()
                .map(|b| b.to_string())
                .unwrap_or_default(),
            output::state_label(&status.state),
            executed_at,
        ]);
    }

    println!("{}", table);

    let pending = statuses
        .iter()
        .filter(|s| matches!(s.state, MigrationState::Pending))
        .count();
    if pending > 0 {
        println!("\n{}", format!("{} pending migration(s)", pending).yellow());
    }

    Ok(())
}
