//! coinsheet - CoinGecko market snapshots to Excel
//!
//! Fetches market data for the given coins and currencies, caching each response on disk,
//! and writes one worksheet per coin/currency pair into a dated workbook.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use coinsheet::app::{self, RunStatus};
use coinsheet::cli::{Cli, RunPlan};

/// Sets up console logging; `RUST_LOG` overrides the default `info` level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let plan = match RunPlan::from_cli(&cli) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    match app::run(&plan).await {
        Ok(RunStatus::Written(_)) => ExitCode::SUCCESS,
        Ok(RunStatus::NoData) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
