use clap::Parser;
use std::process::ExitCode;
use tracing::info;

use edge_gateway::config::{Cli, load_config};
use edge_gateway::logging::init_logging;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        environment = cli.environment.as_deref().unwrap_or("production"),
        run_interval_ms = config.cache.run_interval_millis,
        max_pending_queries = config.cache.max_pending_queries,
        "Configuration loaded"
    );

    match serde_json::to_string_pretty(&config) {
        Ok(rendered) => {
            println!("{}", rendered);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to render configuration: {}", e);
            ExitCode::FAILURE
        }
    }
}
