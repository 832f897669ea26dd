//! cryptohist CLI: one-shot harvest of top-coin market history to CSV.
//!
//! Runs the whole pipeline once: resolve the top coins by market cap, fetch
//! each coin's trailing history, write `date,coin,price,market_cap,volume`.
//! Every flag is optional; with none, the built-in defaults are used.

use anyhow::{Context, Result};
use clap::Parser;
use cryptohist_core::data::{CoinGeckoClient, Harvester, LogProgress, ThreadPacer};
use cryptohist_core::HarvestConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "cryptohist",
    about = "Download daily price, market cap and volume history for the top coins"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply to anything it leaves out.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output CSV path. Defaults to data/crypto_historical_data.csv.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of coins to take from the market-cap ranking.
    #[arg(long)]
    top: Option<usize>,

    /// Trailing window per coin, in days.
    #[arg(long)]
    days: Option<u32>,
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    info!(
        top_n = config.top_n,
        window_days = config.window_days,
        output = %config.output_path.display(),
        "configuration loaded"
    );

    let client = CoinGeckoClient::from_config(&config).context("failed to build HTTP client")?;
    let summary = Harvester::new(&client, &ThreadPacer, &LogProgress, &config).run()?;

    if !summary.all_succeeded() {
        info!(failed = ?summary.failed, "some coins were skipped");
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<HarvestConfig> {
    let mut config = match &cli.config {
        Some(path) => HarvestConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => HarvestConfig::default(),
    };

    if let Some(output) = &cli.output {
        config.output_path = output.clone();
    }
    if let Some(top) = cli.top {
        config.top_n = top;
    }
    if let Some(days) = cli.days {
        config.window_days = days;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}
