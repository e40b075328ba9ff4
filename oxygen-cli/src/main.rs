//! Oxygen CLI - schema migrations from the terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{logs, make_migration, migrate, rollback, status};

/// Oxygen - database migrations for OxygenFramework projects
#[derive(Parser)]
#[command(name = "oxygen", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all pending migrations
    Migrate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Roll back the last batch of migrations
    #[command(name = "migrate:rollback")]
    Rollback {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the status of each migration
    #[command(name = "migrate:status")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new migration file
    #[command(name = "make:migration")]
    MakeMigration {
        /// Migration name, e.g. create_users_table
        name: Option<String>,
        /// Prefill CREATE TABLE / DROP TABLE for this table
        #[arg(long)]
        create: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Migrate { json } => migrate::run(json),
        Commands::Rollback { force, json } => rollback::run(force, json),
        Commands::Status { json } => status::run(json),
        Commands::MakeMigration { name, create, json } => make_migration::run(name, create, json),
        Commands::Logs { command } => logs::run(command),
    }
}
