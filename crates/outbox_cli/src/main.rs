//! Pizza Outbox CLI
//!
//! Command-line client for the offline pizza outbox.
//!
//! # Commands
//!
//! - `submit` - Create a pizza, queueing it if the origin is unreachable
//! - `list` - Show pending writes
//! - `sync` - Submit pending writes now
//! - `clear` - Drop every pending write
//! - `inspect` - Display queue statistics
//! - `watch` - Sync automatically whenever the origin becomes reachable

mod commands;

use clap::{Parser, Subcommand};
use outbox_sync::SyncConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Offline-capable client for the pizza API.
#[derive(Parser)]
#[command(name = "pizza-outbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the queue directory
    #[arg(global = true, short, long, env = "OUTBOX_DIR", default_value = "pizza-outbox")]
    dir: PathBuf,

    /// Base URL of the origin server
    #[arg(global = true, short, long, env = "OUTBOX_ORIGIN", default_value = "http://localhost:3001")]
    origin: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a pizza
    Submit {
        /// Pizza name
        #[arg(short, long, required_unless_present = "json")]
        name: Option<String>,

        /// Who is creating it
        #[arg(short, long, default_value = "anonymous")]
        created_by: String,

        /// Pizza size
        #[arg(short, long, default_value = "Large")]
        size: String,

        /// Topping (repeatable)
        #[arg(short, long = "topping")]
        toppings: Vec<String>,

        /// Raw JSON payload instead of the flags above
        #[arg(long, conflicts_with_all = ["name", "toppings"])]
        json: Option<String>,
    },

    /// Show pending writes
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Submit pending writes now
    Sync,

    /// Drop every pending write
    Clear,

    /// Display queue statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Sync whenever the origin becomes reachable, until Ctrl-C
    Watch {
        /// Reachability probe interval in milliseconds
        #[arg(short, long, default_value = "5000")]
        interval_ms: u64,

        /// How long an online edge must hold before syncing, in milliseconds
        #[arg(long, default_value = "500")]
        settle_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = SyncConfig::new(cli.origin);

    match cli.command {
        Commands::Submit {
            name,
            created_by,
            size,
            toppings,
            json,
        } => {
            let payload = match json {
                Some(raw) => commands::submit::Payload::Raw(raw),
                None => commands::submit::Payload::Pizza {
                    name: name.ok_or("--name is required without --json")?,
                    created_by,
                    size,
                    toppings,
                },
            };
            commands::submit::run(&cli.dir, config, payload).await?;
        }
        Commands::List { format } => {
            commands::list::run(&cli.dir, &format)?;
        }
        Commands::Sync => {
            commands::sync::run(&cli.dir, config).await?;
        }
        Commands::Clear => {
            commands::clear::run(&cli.dir)?;
        }
        Commands::Inspect { format } => {
            commands::inspect::run(&cli.dir, &format)?;
        }
        Commands::Watch {
            interval_ms,
            settle_ms,
        } => {
            let config = config
                .with_probe_interval(Duration::from_millis(interval_ms))
                .with_settle_window(Duration::from_millis(settle_ms));
            commands::watch::run(&cli.dir, config).await?;
        }
    }

    Ok(())
}
