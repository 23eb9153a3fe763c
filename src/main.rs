//! Mining API - daily SPL token reward distribution service
//!
//! # WARNING
//! - This service signs transfers with the treasury private key. Protect the
//!   credentials and test against devnet first.
//! - The caller-supplied wallet address is trusted without signature proof.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use mining_api::cli::commands;
use mining_api::config::Config;

/// Daily SPL token mining reward distribution API
#[derive(Parser)]
#[command(name = "mining-api")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,

    /// Show current configuration (secrets masked)
    Config,

    /// Check system health (RPC, database, treasury)
    Health,

    /// Create the ledger database and schema
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mining_api=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Serve => commands::serve(&config).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
        Commands::InitDb => commands::init_db(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
