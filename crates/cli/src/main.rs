//! Tabetti operator CLI
//!
//! Database setup, trust score maintenance and rating inspection for the
//! Tabetti review store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabetti_reputation::config::{Config, LoggingConfig};
use tracing::debug;

mod cmd;

#[derive(Debug, Parser)]
#[command(name = "tabetti")]
#[command(version, about = "Tabetti trust score operator CLI", long_about = None)]
struct Cli {
    /// Path to configuration file (defaults to ./tabetti.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database URL, overrides the configuration
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database and apply migrations.
    InitDb,
    /// Rebuild every customer's counters and trust score.
    RecomputeTrust(cmd::trust::RecomputeArgs),
    /// List customers whose stored trust state has drifted.
    Audit(cmd::trust::AuditArgs),
    /// Show a customer's counters and trust score.
    Customer(cmd::trust::CustomerArgs),
    /// Show the simple and weighted rating of a store.
    Rating(cmd::rating::RatingArgs),
    /// List the best-rated stores.
    TopStores(cmd::rating::TopStoresArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
        config.validate()?;
    }

    init_logging(&config.logging, cli.debug)?;
    debug!("Database: {}", config.database.url);

    match cli.command {
        Command::InitDb => cmd::db::init(&config).await?,
        Command::RecomputeTrust(args) => cmd::trust::recompute(&config, args).await?,
        Command::Audit(args) => cmd::trust::audit(&config, args).await?,
        Command::Customer(args) => cmd::trust::customer(&config, args).await?,
        Command::Rating(args) => cmd::rating::rating(&config, args).await?,
        Command::TopStores(args) => cmd::rating::top_stores(&config, args).await?,
    }

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(logging: &LoggingConfig, debug: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = if debug {
        EnvFilter::new("tabetti_cli=debug,tabetti_reputation=debug,sqlx=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "tabetti_cli={level},tabetti_reputation={level}",
                level = logging.level
            ))
        })
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so command output on stdout stays parseable.
    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
