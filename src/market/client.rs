//! CoinGecko `/coins/markets` client

use reqwest::Client;
use serde_json::Value;

use super::FetchError;
use crate::config::{Config, DEFAULT_API_URL};

/// Header carrying the CoinGecko API key
const API_KEY_HEADER: &str = "x-cg-api-key";

/// Anything that can answer a market-data query for one coin in one currency
///
/// The returned value is the decoded response body; shape checks happen in the fetcher.
#[allow(async_fn_in_trait)]
pub trait MarketSource {
    async fn fetch_markets(&self, coin_id: &str, currency: &str) -> Result<Value, FetchError>;
}

/// Client for the CoinGecko markets endpoint
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl CoinGeckoClient {
    /// Creates a client for the public API with the given key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_API_URL, api_key)
    }

    /// Creates a client against a custom base URL
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Creates a client from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::with_base_url(config.api_url(), config.api_key.clone())
    }

    /// Full URL of the markets endpoint
    fn markets_url(&self) -> String {
        format!("{}/coins/markets", self.base_url)
    }

    /// Query parameters for a single-coin markets request
    fn query<'a>(coin_id: &'a str, currency: &'a str) -> [(&'static str, &'a str); 7] {
        [
            ("vs_currency", currency),
            ("ids", coin_id),
            ("order", "market_cap_desc"),
            ("per_page", "100"),
            ("page", "1"),
            ("sparkline", "false"),
            ("price_change_percentage", "24h"),
        ]
    }
}

impl MarketSource for CoinGeckoClient {
    async fn fetch_markets(&self, coin_id: &str, currency: &str) -> Result<Value, FetchError> {
        let response = self
            .http_client
            .get(self.markets_url())
            .query(&Self::query(coin_id, currency))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}
