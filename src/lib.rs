pub mod cli;
pub mod config;
pub mod core;
pub mod gui;
pub mod locale;
pub mod price;
pub mod shop;
pub mod stats;
pub mod store;
pub mod transaction;

pub use shop::Shop;

use anyhow::Result;
use tracing::{debug, info};

/// Operator commands that need a loaded configuration.
pub enum AppCommand {
    Check,
    Stats { json: bool },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Check => {
            info!("Checking configuration");
            cli::prices::run(&config)
        }
        AppCommand::Stats { json } => cli::stats::run(&config, json).await,
    }
}
