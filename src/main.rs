use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tradepost::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Validate configuration and list sell prices
    Check,
    /// Display persisted transaction statistics
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => tradepost::cli::setup::setup_at_path(path),
            None => tradepost::cli::setup::setup(),
        },
        Some(Commands::Check) => {
            tradepost::run_command(tradepost::AppCommand::Check, cli.config_path.as_deref()).await
        }
        Some(Commands::Stats { json }) => {
            tradepost::run_command(
                tradepost::AppCommand::Stats { json },
                cli.config_path.as_deref(),
            )
            .await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}
