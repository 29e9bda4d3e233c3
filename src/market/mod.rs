//! CoinGecko market data
//!
//! `client` talks to the `/coins/markets` endpoint, `fetcher` runs the cache-checked loop
//! over the requested coins for one currency.

pub mod client;
pub mod fetcher;

pub use client::{CoinGeckoClient, MarketSource};
pub use fetcher::{extract_snapshot, successful, FetchedSnapshot, MarketFetcher, PairOutcome};

use serde_json::{Map, Value};
use thiserror::Error;

/// One coin's market object for one currency, fields kept verbatim from the API
pub type Snapshot = Map<String, Value>;

/// Errors that can occur while producing the snapshot for a single pair
///
/// None of these are fatal; the pair is logged and left out of the output.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed or the body could not be decoded
    #[error("API request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body is not a JSON array
    #[error("API response is not a list")]
    NotAList,

    /// An element of the response array is not a JSON object
    #[error("API response entry {index} is not an object")]
    NonObjectEntry { index: usize },

    /// The API returned an empty list
    #[error("No data found")]
    NoData,

    /// The snapshot was fetched but could not be cached
    #[error("Failed to write cache: {0}")]
    Cache(#[from] std::io::Error),
}

impl FetchError {
    /// True for response shape problems, as opposed to transport or storage failures
    pub fn is_validation(&self) -> bool {
        matches!(self, FetchError::NotAList | FetchError::NonObjectEntry { .. })
    }
}
