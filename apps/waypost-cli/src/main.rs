//! Waypost CLI - Sign in and call the Waypost API.

mod commands;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use client_config::{init_logging, Config, Paths};
use commands::CommandContext;
use tracing::debug;

/// Waypost CLI - Sign in and call the Waypost API with automatic session renewal.
#[derive(Parser)]
#[command(name = "waypost")]
#[command(about = "Waypost CLI for authentication and API requests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login,

    /// Logout and clear the stored session
    Logout,

    /// Check authentication status
    Status,

    /// Renew the access credential now
    Refresh,

    /// Send an authenticated request and print the response body
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,
        /// Path relative to the API base URL
        path: String,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long)]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli.command, cli.log_level, &cli.format).await {
        output::print_error(&format!("{:#}", e), &cli.format);
        std::process::exit(1);
    }
}

async fn run(
    command: Commands,
    log_level: Option<String>,
    format: &output::OutputFormat,
) -> anyhow::Result<()> {
    let paths = Paths::new().context("Failed to resolve the Waypost directory")?;
    paths.ensure_dirs().context("Failed to create the Waypost directory")?;
    let config = Config::load(&paths).context("Failed to load configuration")?;

    let level = log_level.unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, Some(paths.log_file()));
    debug!(api_base_url = %config.api_base_url, "Starting waypost");

    let ctx = CommandContext::load(&paths, config)?;

    match command {
        Commands::Login => commands::login(&ctx, format).await,
        Commands::Logout => commands::logout(&ctx, format),
        Commands::Status => commands::status(&ctx, format),
        Commands::Refresh => commands::refresh(&ctx, format).await,
        Commands::Request {
            method,
            path,
            body,
            query,
        } => commands::request(&ctx, &method, &path, body.as_deref(), &query, format).await,
    }
}
