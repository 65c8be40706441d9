//! # sync-cli
//!
//! CLI tool for exercising the storesync protocol.
//!
//! ## Commands
//!
//! - `demo`: Sync two counter stores in one process and report their state
//! - `config`: Show the effective settings
//!
//! ## Example
//!
//! ```bash
//! # Three increments and a decrement, dispatched before sync starts
//! storesync demo --count 3
//!
//! # Keep the decrement on the first store
//! storesync demo --count 3 --reject-decrement --json
//!
//! # Use a JSON-lines byte stream instead of in-memory channels
//! storesync demo --stream
//!
//! # Inspect settings
//! storesync config --config storesync.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod counter;

use commands::demo::DemoOptions;

/// CLI tool for exercising the storesync protocol.
#[derive(Parser, Debug)]
#[command(name = "storesync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file (default: ./storesync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync two counter stores and report their final state
    Demo {
        /// Increments dispatched before sync starts
        #[arg(long, default_value = "1")]
        count: u32,

        /// Keep DECREMENT on the first store
        #[arg(long)]
        reject_decrement: bool,

        /// Connect the stores over a JSON-lines stream
        #[arg(long)]
        stream: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (settings, source) = commands::config::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Demo {
            count,
            reject_decrement,
            stream,
            json,
        } => {
            let options = DemoOptions {
                count,
                reject_decrement,
                stream,
            };
            commands::demo::run(&settings, &options, json).await?;
        }
        Commands::Config => {
            commands::config::run(&settings, source.as_deref())?;
        }
    }

    Ok(())
}
