use clap::Parser;
use figment::{Figment, providers::{Env, Format, Toml, Serialized}};
use garde::Validate;
use std::path::PathBuf;

use super::AppConfig;
use crate::error::GatewayError;

/// Environment variable prefix for configuration overrides,
/// e.g. `GATEWAY_CACHE__MAX_PENDING_QUERIES=10`.
pub const ENV_PREFIX: &str = "GATEWAY_";

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "edge-gateway", about = "Resolve and validate the edge gateway configuration")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, env = "GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Environment name, selects `config/{environment}.toml`
    #[arg(long, env = "ENVIRONMENT")]
    pub environment: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    fn environment_name(&self) -> String {
        self.environment.clone().unwrap_or_else(|| "production".to_string())
    }
}

/// Build the layered configuration source.
///
/// Precedence, lowest first: embedded defaults, the default (or `--config`)
/// file, the environment-specific file, `GATEWAY_` environment variables,
/// then CLI flags.
pub fn figment(cli: &Cli) -> Figment {
    let base_file = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config/default.toml"));

    let mut figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(base_file))
        .merge(Toml::file(format!("config/{}.toml", cli.environment_name())))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    if cli.debug {
        figment = figment.merge(Serialized::default("logging.level", "debug"));
    }

    figment
}

/// Extract and validate a configuration from any figment.
pub fn extract_config(figment: Figment) -> Result<AppConfig, GatewayError> {
    let config: AppConfig = figment.extract()?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(cli: &Cli) -> Result<AppConfig, GatewayError> {
    extract_config(figment(cli))
}
