//! Concierge admin binary.
//!
//! 1. Parse CLI arguments and resolve the config file
//! 2. Initialise logging
//! 3. Run the requested maintenance command against the durable history

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use concierge_core::config::ConciergeConfig;
use concierge_core::logging;

use crate::cli::{CliArgs, Command};

fn run(args: CliArgs) -> concierge_core::Result<()> {
    let mut out = std::io::stdout().lock();

    if let Command::InitConfig { ref path, force } = args.command {
        return commands::init_config(path, force, &mut out);
    }

    let config_file = args.resolve_config_path();
    let config = ConciergeConfig::load_or_default(&config_file);
    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    let history = commands::open_history(&data_dir, &config)?;

    match args.command {
        Command::InitConfig { .. } => Ok(()),
        Command::List { limit } => commands::list(&history, limit, &mut out),
        Command::History { ref id, json } => commands::show_history(&history, id, json, &mut out),
        Command::Delete { ref id } => commands::delete(&history, id, &mut out),
        Command::Prune { ttl_minutes } => {
            let ttl = ttl_minutes.unwrap_or(config.conversation.ttl_minutes);
            commands::prune(&history, ttl, &mut out)
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Log level comes from the config file unless overridden on the command line.
    let config_level = ConciergeConfig::load(&args.resolve_config_path())
        .map(|c| c.general.log_level)
        .unwrap_or_else(|_| "info".to_string());
    logging::init(&args.resolve_log_level(&config_level));

    tracing::debug!("Starting concierge v{}", env!("CARGO_PKG_VERSION"));

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
