//! Shelf CLI - manage your product catalog from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Create an account (signs in unless auto-login is disabled)
//! shelf register a@b.com
//!
//! # Add and inspect products
//! shelf add "Pen" 2.50 -d blue
//! shelf list
//! shelf edit <id> --price 3
//!
//! # Follow live changes until Ctrl-C
//! shelf watch
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - log filter (logs go to stderr)
//! - `SHELF_DB_PATH`, `SHELF_NAMESPACE`, `SHELF_STORAGE_DIR`, ... - see
//!   [`shelf_client::config`]

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shelf_client::{ClientConfig, ShelfClient};

mod commands;
mod error;

use error::CliResult;

#[derive(Parser)]
#[command(name = "shelf")]
#[command(author, version, about = "Personal product catalog")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results and errors as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Register {
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in
    Login {
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Add a product
    Add {
        name: String,
        /// Number, e.g. 2.50
        price: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List products sorted by name
    List,
    /// Show one product
    Show { id: String },
    /// Change some fields of a product
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a product
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the catalog on every change until Ctrl-C
    Watch,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = ClientConfig::load(cli.config).context("Failed to load configuration")?;

    if let Commands::Config = cli.command {
        return finish(commands::show_config(&config, cli.json), cli.json);
    }

    let client = ShelfClient::init(config)
        .await
        .context("Failed to start Shelf client")?;

    let result = commands::dispatch(&client, cli.command, cli.json).await;
    client.shutdown().await;

    finish(result, cli.json)
}

/// With `--json` a command failure is reported once, as JSON on stdout;
/// otherwise it is handed back to `main` for the stderr line.
fn finish(result: CliResult<()>, json: bool) -> anyhow::Result<ExitCode> {
    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if json => {
            println!("{}", serde_json::to_string_pretty(&e)?);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

/// Initializes the tracing subscriber. Logs go to stderr so command output
/// on stdout stays clean.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=shelf=trace` - Show trace for shelf crates only
/// - Default: warnings, or more with `-v`
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info,shelf=debug,sqlx=warn",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
