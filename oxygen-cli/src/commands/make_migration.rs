//! make:migration command - scaffold a new migration file

use anyhow::Result;
use colored::Colorize;
use dialoguer::Input;
use oxygen_core::services::LogEvent;
use oxygen_core::OperationResult;

use super::{get_context, get_logger, log_event};
use crate::output;

pub fn run(name: Option<String>, create: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;

    // Ask for the name interactively if not provided
    let name = match name {
        Some(n) => n,
        None => Input::new()
            .with_prompt("Migration name (e.g. create_users_table)")
            .interact_text()?,
    };

    let generated = ctx.generator().generate(&name, create.as_deref())?;

    log_event(
        &get_logger(),
        LogEvent::new("migration_created")
            .with_command("make:migration")
            .with_migration(generated.name.clone()),
    );

    if json {
        return output::json(&OperationResult::ok(&generated));
    }

    output::success(&format!("Created migration: {}", generated.name));
    println!("  {}", generated.path.display().to_string().dimmed());
    println!(
        "  {}",
        format!("Registered as {}", generated.identifier).dimmed()
    );

    Ok(())
}
