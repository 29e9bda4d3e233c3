//! Run pipeline: config, fetch, transform, write
//!
//! `run` wires the real CoinGecko client and on-disk cache; `run_with` takes any fetcher so
//! the pipeline can be exercised without network or a fixed cache directory.

use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

use crate::cache::{FileCache, SnapshotCache};
use crate::cli::RunPlan;
use crate::config::{Config, ConfigError};
use crate::market::{successful, CoinGeckoClient, MarketFetcher, MarketSource};
use crate::table::{transform, TransformError};
use crate::workbook::{output_file_name, sheet_name, write_workbook, Sheets, WorkbookError};

/// Errors that end a run
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to transform {sheet}: {source}")]
    Transform {
        sheet: String,
        #[source]
        source: TransformError,
    },

    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

/// How a run finished without a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The workbook was written to this path
    Written(PathBuf),
    /// Nothing could be fetched; no file was written
    NoData,
}

/// Loads the config and runs the pipeline against CoinGecko
pub async fn run(plan: &RunPlan) -> Result<RunStatus, AppError> {
    let config = Config::load(&plan.config_path)?;

    let client = CoinGeckoClient::from_config(&config);
    let cache = FileCache::with_dir(plan.cache_dir.clone());
    let fetcher = MarketFetcher::new(client, cache, config.cache_ttl());

    run_with(&fetcher, plan, Local::now().date_naive()).await
}

/// Fetches every coin for every currency, then writes one sheet per snapshot
pub async fn run_with<S, C>(
    fetcher: &MarketFetcher<S, C>,
    plan: &RunPlan,
    today: NaiveDate,
) -> Result<RunStatus, AppError>
where
    S: MarketSource,
    C: SnapshotCache,
{
    let mut fetched = Vec::new();
    for currency in &plan.currencies {
        let outcomes = fetcher.fetch_coins(&plan.coin_ids, currency).await;
        fetched.extend(successful(outcomes));
    }

    if fetched.is_empty() {
        error!("No data fetched. Please check the coin IDs and API key.");
        return Ok(RunStatus::NoData);
    }

    let mut sheets = Sheets::new();
    for item in fetched {
        let name = sheet_name(&item.coin_id, &item.currency);
        let table = transform(std::slice::from_ref(&item.snapshot)).map_err(|source| {
            AppError::Transform {
                sheet: name.clone(),
                source,
            }
        })?;
        sheets.insert(&item.coin_id, &item.currency, table);
    }

    let path = plan.output_dir.join(output_file_name(today));
    write_workbook(&path, &sheets)?;
    info!(path = %path.display(), sheets = sheets.len(), "Data written to workbook");

    Ok(RunStatus::Written(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::market::fetcher::tests::{bitcoin_body, FakeSource};
    use crate::workbook::tests::read_sheet;
    use calamine::Data;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn plan_in(dir: &TempDir, coins: &[&str], currencies: &[&str]) -> RunPlan {
        RunPlan {
            coin_ids: coins.iter().map(|s| s.to_string()).collect(),
            currencies: currencies.iter().map(|s| s.to_string()).collect(),
            config_path: dir.path().join("config.json"),
            cache_dir: dir.path().join(".cache"),
            output_dir: dir.path().to_path_buf(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    #[tokio::test]
    async fn test_single_pair_writes_dated_workbook() {
        let temp_dir = TempDir::new().unwrap();
        let plan = plan_in(&temp_dir, &["bitcoin"], &["usd"]);
        let source = FakeSource::default().with("bitcoin", "usd", bitcoin_body());
        let fetcher = MarketFetcher::new(source, FileCache::with_dir(plan.cache_dir.clone()), HOUR);

        let status = run_with(&fetcher, &plan, today()).await.unwrap();

        let expected = temp_dir.path().join("coingecko_data_15-07-2024.xlsx");
        assert_eq!(status, RunStatus::Written(expected.clone()));
        assert!(plan.cache_dir.join("bitcoin_usd.json").exists());

        let rows = read_sheet(&expected, "bitcoin_usd");
        assert_eq!(rows.len(), 2, "Header plus exactly one data row");
        let header: Vec<String> = rows[0].iter().map(|c| c.to_string()).collect();
        assert_eq!(header[0], "id", "No index column before the data");
        let cell = |column: &str| {
            let col = header.iter().position(|h| h == column).expect("Column should exist");
            rows[1][col].clone()
        };
        assert_eq!(cell("id"), Data::String("bitcoin".to_string()));
        assert_eq!(cell("current_price"), Data::Float(65000.0));
        assert_eq!(cell("market_cap"), Data::Float(1.2e12));
        assert_eq!(cell("volume"), Data::Float(3e10));
    }

    #[tokio::test]
    async fn test_long_coin_id_gets_one_sheet_per_currency() {
        let temp_dir = TempDir::new().unwrap();
        let coin = "avalanche-bridged-usdc-avalanche";
        let plan = plan_in(&temp_dir, &[coin], &["usd", "eur"]);
        let body = json!([{"id": coin, "current_price": 1.0, "market_cap": 5e8, "total_volume": 2e7}]);
        let source = FakeSource::default()
            .with(coin, "usd", body.clone())
            .with(coin, "eur", body);
        let fetcher = MarketFetcher::new(source, MemoryCache::new(), HOUR);

        let status = run_with(&fetcher, &plan, today()).await.unwrap();

        let path = match status {
            RunStatus::Written(path) => path,
            other => panic!("expected a workbook, got {other:?}"),
        };
        assert_eq!(read_sheet(&path, "avalanche-bridged-usdc-aval_usd").len(), 2);
        assert_eq!(read_sheet(&path, "avalanche-bridged-usdc-aval_eur").len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_within_ttl_is_served_from_cache() {
        let temp_dir = TempDir::new().unwrap();
        let plan = plan_in(&temp_dir, &["bitcoin"], &["usd"]);
        let source = FakeSource::default().with("bitcoin", "usd", bitcoin_body());
        let fetcher = MarketFetcher::new(source, MemoryCache::new(), HOUR);

        run_with(&fetcher, &plan, today()).await.unwrap();
        let status = run_with(&fetcher, &plan, today()).await.unwrap();

        assert!(matches!(status, RunStatus::Written(_)));
        assert_eq!(fetcher.source().calls(), 1);
    }

    #[tokio::test]
    async fn test_every_coin_currency_pair_is_fetched() {
        let temp_dir = TempDir::new().unwrap();
        let plan = plan_in(&temp_dir, &["bitcoin", "ethereum"], &["usd", "eur"]);
        let eth = json!([{"id": "ethereum", "current_price": 3000, "market_cap": 3.6e11, "total_volume": 1.5e10}]);
        let source = FakeSource::default()
            .with("bitcoin", "usd", bitcoin_body())
            .with("bitcoin", "eur", bitcoin_body())
            .with("ethereum", "usd", eth.clone())
            .with("ethereum", "eur", eth);
        let fetcher = MarketFetcher::new(source, MemoryCache::new(), HOUR);

        let status = run_with(&fetcher, &plan, today()).await.unwrap();

        assert!(matches!(status, RunStatus::Written(_)));
        assert_eq!(fetcher.source().calls(), 4);
        assert_eq!(fetcher.cache().len(), 4);
    }

    #[tokio::test]
    async fn test_no_data_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let plan = plan_in(&temp_dir, &["doesnotexist"], &["usd"]);
        let fetcher = MarketFetcher::new(FakeSource::default(), MemoryCache::new(), HOUR);

        let status = run_with(&fetcher, &plan, today()).await.unwrap();

        assert_eq!(status, RunStatus::NoData);
        assert!(!temp_dir.path().join("coingecko_data_15-07-2024.xlsx").exists());
    }

    #[tokio::test]
    async fn test_partial_failure_still_writes_workbook() {
        let temp_dir = TempDir::new().unwrap();
        let plan = plan_in(&temp_dir, &["bitcoin", "doesnotexist"], &["usd"]);
        let source = FakeSource::default()
            .with("bitcoin", "usd", bitcoin_body())
            .failing("doesnotexist", "usd");
        let fetcher = MarketFetcher::new(source, MemoryCache::new(), HOUR);

        let status = run_with(&fetcher, &plan, today()).await.unwrap();

        assert!(matches!(status, RunStatus::Written(_)));
    }

    #[tokio::test]
    async fn test_bad_numeric_field_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let plan = plan_in(&temp_dir, &["bitcoin"], &["usd"]);
        let body = json!([{"id": "bitcoin", "current_price": "n/a", "market_cap": 1, "total_volume": 1}]);
        let source = FakeSource::default().with("bitcoin", "usd", body);
        let fetcher = MarketFetcher::new(source, MemoryCache::new(), HOUR);

        let err = run_with(&fetcher, &plan, today()).await.unwrap_err();

        assert!(matches!(err, AppError::Transform { ref sheet, .. } if sheet == "bitcoin_usd"));
    }

    #[tokio::test]
    async fn test_run_without_config_creates_default() {
        let temp_dir = TempDir::new().unwrap();
        let plan = plan_in(&temp_dir, &["bitcoin"], &["usd"]);

        let err = run(&plan).await.unwrap_err();

        assert!(matches!(err, AppError::Config(ConfigError::CreatedDefault(_))));
        assert!(plan.config_path.exists());
    }
}
