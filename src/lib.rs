pub mod cli;
pub mod commands;
pub mod error;
pub mod models;
pub mod services;

use clap::Parser;
use cli::{Cli, Commands};
use error::AppError;
use services::settings_service::JsonSettingsStore;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays clean for results.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let store = match &cli.settings {
        Some(path) => JsonSettingsStore::new(path),
        None => JsonSettingsStore::open_default()?,
    };
    debug!("Using settings at {}", store.path().display());

    match cli.command {
        Commands::Classify(args) => commands::classifier::classify(args, &store, cli.quiet),
        Commands::Theme { action } => commands::theme::run(action, &store),
        Commands::Settings { action } => commands::settings::run(action, &store),
    }
}
