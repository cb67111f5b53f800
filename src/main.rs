//! Memebot - Solana memecoin trading bot
//!
//! # WARNING
//! - This bot trades with real money. Only use funds you can afford to lose.
//! - Most freshly listed tokens go to zero (rug pulls, abandonment).
//! - TP/SL is best-effort at 5-second polling; fast rugs can gap through
//!   your stop-loss before detection.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use memebot::cli::commands;
use memebot::config::Config;

/// Solana memecoin trading bot
#[derive(Parser)]
#[command(name = "memebot")]
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
    /// Start the discovery loop and position monitors
    Start {
        /// Run in dry-run mode (no real trades)
        #[arg(long)]
        dry_run: bool,
    },

    /// Manually sell a token position
    Sell {
        /// Token mint address
        token: String,

        /// Amount to sell: percentage like "50%" or absolute token amount
        #[arg(default_value = "100%")]
        amount: String,

        /// Simulate only, don't execute
        #[arg(long)]
        dry_run: bool,
    },

    /// Show current positions and P&L
    Status,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("memebot=info".parse().unwrap()),
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
        Commands::Start { dry_run } => commands::start(&config, dry_run).await,
        Commands::Sell {
            token,
            amount,
            dry_run,
        } => commands::sell(&config, &token, &amount, dry_run).await,
        Commands::Status => commands::status(&config).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
