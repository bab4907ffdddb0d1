//! fieldsync CLI - record plot observations offline and replay them to a
//! BrAPI server.

mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::dead_letter::run_dead_letter;
use crate::commands::import::run_import;
use crate::commands::observe::run_observe;
use crate::commands::pending::run_pending;
use crate::commands::plots::run_plots;
use crate::commands::scan::run_scan;
use crate::commands::settings::run_settings;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

const DEFAULT_LOG_DIRECTIVE: &str = "fieldsync=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let db_path = resolve_db_path(cli.db_path)?;

    match command {
        Commands::Import { path } => run_import(&path, &db_path).await,
        Commands::Plots { trial, json } => run_plots(&trial, json, &db_path).await,
        Commands::Scan { code, trial, json } => run_scan(&code, trial, json, &db_path).await,
        Commands::Observe {
            code,
            trial,
            values,
        } => run_observe(&code, trial, &values, &db_path).await,
        Commands::Pending { json } => run_pending(json, &db_path).await,
        Commands::DeadLetter { command } => run_dead_letter(command, &db_path).await,
        Commands::Sync { watch, interval } => run_sync(watch, interval, profile, &db_path).await,
        Commands::Status { runs, probe, json } => {
            run_status(runs, probe, json, profile, &db_path).await
        }
        Commands::Settings { command } => run_settings(command, &db_path).await,
        Commands::Config { command } => run_config(command, profile),
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}
