//! Command-line interface parsing for coinsheet
//!
//! Coin ids and currencies are both positional lists. Currencies follow a `--` separator;
//! without one, the last token is taken as the only currency.

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::DEFAULT_CACHE_DIR;
use crate::config::DEFAULT_CONFIG_PATH;

/// Error types for CLI argument parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// No currency could be determined from the arguments
    #[error("At least one coin ID and one currency are required, e.g. `coinsheet bitcoin ethereum -- usd eur`")]
    MissingCurrency,
}

/// Fetch CoinGecko data and store it in an Excel file
///
/// The interface is `coinsheet COIN_IDS... [-- CURRENCIES...]`. `--config`, `--cache-dir`
/// and `--output-dir` are optional overrides; left out, they resolve to `config.json`,
/// `.cache` and the working directory, so a plain positional invocation behaves the same
/// with or without them.
#[derive(Parser, Debug)]
#[command(name = "coinsheet")]
#[command(about = "Fetch CoinGecko market data and store it in an Excel file")]
#[command(version)]
pub struct Cli {
    /// Coin IDs to fetch (e.g. bitcoin ethereum)
    #[arg(required = true, num_args = 1.., value_name = "COIN_IDS")]
    pub coin_ids: Vec<String>,

    /// Currencies to price the coins in, after `--` (e.g. -- usd eur)
    #[arg(last = true, value_name = "CURRENCIES")]
    pub currencies: Vec<String>,

    /// Path to the JSON config file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Directory for cached API responses
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Directory the workbook is written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,
}

/// Everything a run needs, resolved from the CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub coin_ids: Vec<String>,
    pub currencies: Vec<String>,
    pub config_path: PathBuf,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl RunPlan {
    /// Splits the positional tokens into coin ids and currencies
    ///
    /// # Returns
    /// * `Ok(RunPlan)` with at least one coin id and one currency
    /// * `Err(CliError::MissingCurrency)` if only a single token was given without `--`
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut coin_ids = cli.coin_ids.clone();
        let currencies = if cli.currencies.is_empty() {
            // Greedy split: coins take all but the final token
            if coin_ids.len() < 2 {
                return Err(CliError::MissingCurrency);
            }
            coin_ids.pop().into_iter().collect()
        } else {
            cli.currencies.clone()
        };

        if coin_ids.is_empty() {
            return Err(CliError::MissingCurrency);
        }

        Ok(RunPlan {
            coin_ids,
            currencies,
            config_path: cli.config.clone(),
            cache_dir: cli.cache_dir.clone(),
            output_dir: cli.output_dir.clone(),
        })
    }
}
