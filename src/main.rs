//! Substation auction CLI
//!
//! Runs one market period from a JSON input file and prints the published
//! results as JSON.
//!
//! Usage:
//!   substation-auction --input period.json [OPTIONS]
//!
//! Options:
//!   --config <file>     Market configuration JSON (defaults to AUCTION_* env vars)
//!   --pretty            Pretty-print the output
//!   --json-logs         Emit logs as JSON lines on stderr
//!   --metadata          Include the accounting record column legend

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use substation_auction::config::{Config, MarketConfig};
use substation_auction::observability::init_tracing;
use substation_auction::{AccountingRecord, PeriodInput, SubstationAuction};

#[derive(Parser, Debug)]
#[command(name = "substation-auction")]
#[command(about = "Clear one period of a substation double-auction market")]
#[command(version)]
struct Args {
    /// Period input: reference price/load, unresponsive load and bids
    #[arg(short, long)]
    input: PathBuf,

    /// Market configuration file (defaults to AUCTION_* environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(short, long)]
    pretty: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    json_logs: bool,

    /// Include the accounting record column legend in the output
    #[arg(long)]
    metadata: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let env_config = Config::from_env()?;
    init_tracing(&env_config.log_level, args.json_logs || env_config.json_logs());
    info!("Loaded configuration for environment: {}", env_config.environment);

    let market_config = match &args.config {
        Some(path) => MarketConfig::from_json_file(path)
            .with_context(|| format!("Failed to load market config from {}", path.display()))?,
        None => env_config.market,
    };

    let input = PeriodInput::from_json_file(&args.input)
        .with_context(|| format!("Failed to read period input from {}", args.input.display()))?;

    let mut auction = SubstationAuction::new(market_config);
    auction.init_auction();
    let report = auction.run_period(input)?;

    let mut output = serde_json::to_value(&report)?;
    if args.metadata {
        output["metadata"] = json!(AccountingRecord::metadata());
    }

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}
