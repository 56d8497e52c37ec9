mod config;
mod data;
mod execution;
mod notify;
mod strategies;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use config::{Config, EnvConfig};
use data::odds_api::OddsApiClient;
use execution::runner::{build_notifier, RunOutcome, Runner};

#[derive(Parser)]
#[command(name = "dailyfav")]
#[command(about = "Email today's moneyline favorites")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log the digest instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Build the digest for this local date instead of today
    #[arg(long, value_name = "YYYY-MM-DD", conflicts_with = "watch")]
    date: Option<NaiveDate>,

    /// Keep running and send a digest every day
    #[arg(long)]
    watch: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("Run failed: {:#}", e);
            ExitCode::from(RunOutcome::EXIT_FAILED)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    tracing::info!("Loading configuration...");
    let config = Config::load_or_default(&cli.config)?;
    let env_config = EnvConfig::load()?;
    let dry_run = cli.dry_run || env_config.dry_run;

    let odds = OddsApiClient::new(config.odds.clone(), env_config.odds_api_key.clone())?;
    tracing::info!(
        sport = odds.sport(),
        bookmakers = ?config.odds.bookmakers,
        channel = ?config.notifier.channel,
        dry_run,
        "Configured"
    );

    let notifier = build_notifier(&config, &env_config, dry_run)?;
    let runner = Runner::new(Box::new(odds), notifier, &config)?;

    if cli.watch {
        tracing::info!(timezone = %runner.tz().name(), "Watching for new days");
        runner.watch(config.schedule.run_at_offset_mins).await?;
        return Ok(RunOutcome::EXIT_OK);
    }

    let outcome = runner.run_once(cli.date).await?;
    tracing::info!(?outcome, "Run finished");

    let code = outcome.exit_code(config.notifier.strict_delivery);
    if let Some(error) = outcome.delivery_error() {
        if code == RunOutcome::EXIT_UNDELIVERED {
            tracing::error!(error = %error, "Strict delivery: exiting with failure");
        } else {
            tracing::warn!(error = %error, "Digest was built but not delivered");
        }
    }
    Ok(code)
}
