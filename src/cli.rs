use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::models::SyncConfig;

#[derive(Parser)]
#[command(name = "stocksync")]
#[command(about = "Daily stock price sync from Alpha Vantage", long_about = None)]
pub struct Cli {
    /// SQLite database file (overrides STOCKSYNC_DATABASE)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the scheduler and the operator HTTP server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Run a sweep immediately instead of waiting for the daily fire time
        #[arg(long)]
        run_now: bool,
    },
    /// Sync the whole watch-list now, or a single symbol
    Pull {
        /// Symbol to sync (default: full sweep)
        symbol: Option<String>,
    },
    /// Show the latest sync run per instrument
    Status,
    /// Insert the default watch-list
    Seed,
    /// Put an instrument back on the daily sweep
    Activate { symbol: String },
    /// Take an instrument off the daily sweep (it is never deleted)
    Deactivate { symbol: String },
    /// Validate the API key and show recent prices for a symbol
    Check {
        #[arg(default_value = "AAPL")]
        symbol: String,

        /// Number of recent sessions to show
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
}

fn load_config(database: Option<PathBuf>, port: Option<u16>) -> SyncConfig {
    let mut config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    if let Some(database) = database {
        config.database_path = database;
    }
    if let Some(port) = port {
        config.port = port;
    }
    config
}

pub async fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, run_now } => {
            commands::serve::run(load_config(cli.database, port), run_now).await;
        }
        Commands::Pull { symbol } => {
            commands::pull::run(load_config(cli.database, None), symbol).await;
        }
        Commands::Status => {
            commands::status::run(load_config(cli.database, None)).await;
        }
        Commands::Seed => {
            commands::seed::run(load_config(cli.database, None)).await;
        }
        Commands::Activate { symbol } => {
            commands::watchlist::run(load_config(cli.database, None), symbol, true).await;
        }
        Commands::Deactivate { symbol } => {
            commands::watchlist::run(load_config(cli.database, None), symbol, false).await;
        }
        Commands::Check { symbol, count } => {
            commands::check::run(load_config(cli.database, None), symbol, count).await;
        }
    }
}
