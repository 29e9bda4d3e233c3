//! Cache-checked fetch loop
//!
//! For each coin the fetcher first looks for a fresh cached snapshot, otherwise issues one
//! request, validates the response shape, caches the best match and returns it. Failures are
//! recorded per pair and never stop the loop.

use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use super::{FetchError, MarketSource, Snapshot};
use crate::cache::{cache_key, SnapshotCache};

/// Outcome of fetching one coin in one currency
#[derive(Debug)]
pub struct PairOutcome {
    pub coin_id: String,
    pub currency: String,
    pub result: Result<Snapshot, FetchError>,
}

/// Validates a markets response and keeps its first (highest ranked) entry
///
/// # Returns
/// * `Ok(Snapshot)` - the first entry of a non-empty array of objects
/// * `Err(FetchError::NotAList)` - the body is not an array
/// * `Err(FetchError::NonObjectEntry)` - some entry is not an object
/// * `Err(FetchError::NoData)` - the array is empty
pub fn extract_snapshot(body: Value) -> Result<Snapshot, FetchError> {
    let entries = match body {
        Value::Array(entries) => entries,
        _ => return Err(FetchError::NotAList),
    };

    if let Some(index) = entries.iter().position(|entry| !entry.is_object()) {
        return Err(FetchError::NonObjectEntry { index });
    }

    match entries.into_iter().next() {
        Some(Value::Object(first)) => Ok(first),
        _ => Err(FetchError::NoData),
    }
}

/// A snapshot together with the pair it was requested for
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSnapshot {
    pub coin_id: String,
    pub currency: String,
    pub snapshot: Snapshot,
}

/// Keeps the successful snapshots, in request order
pub fn successful(outcomes: Vec<PairOutcome>) -> Vec<FetchedSnapshot> {
    outcomes
        .into_iter()
        .filter_map(|o| {
            o.result.ok().map(|snapshot| FetchedSnapshot {
                coin_id: o.coin_id,
                currency: o.currency,
                snapshot,
            })
        })
        .collect()
}

/// Runs the cache-or-network lookup for coin/currency pairs
#[derive(Debug)]
pub struct MarketFetcher<S, C> {
    source: S,
    cache: C,
    ttl: Duration,
}

impl<S: MarketSource, C: SnapshotCache> MarketFetcher<S, C> {
    pub fn new(source: S, cache: C, ttl: Duration) -> Self {
        Self { source, cache, ttl }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Produces the snapshot for one pair, from cache when fresh
    pub async fn fetch_pair(&self, coin_id: &str, currency: &str) -> Result<Snapshot, FetchError> {
        let key = cache_key(coin_id, currency);

        if let Some(cached) = self.cache.read(&key, self.ttl) {
            if !cached.is_expired {
                info!(coin_id, currency, cached_at = %cached.cached_at, "Loading data from cache");
                return Ok(cached.data);
            }
        }

        info!(coin_id, currency, "Fetching data from CoinGecko API");
        let body = self.source.fetch_markets(coin_id, currency).await?;
        let snapshot = extract_snapshot(body)?;

        self.cache.write(&key, &snapshot)?;
        Ok(snapshot)
    }

    /// Fetches every coin for one currency, in order, logging failures
    pub async fn fetch_coins(&self, coin_ids: &[String], currency: &str) -> Vec<PairOutcome> {
        let mut outcomes = Vec::with_capacity(coin_ids.len());

        for coin_id in coin_ids {
            let result = self.fetch_pair(coin_id, currency).await;

            match &result {
                Ok(_) => {}
                Err(FetchError::NoData) => {
                    info!(coin_id = %coin_id, currency, "No data found for coin ID");
                }
                Err(e) if e.is_validation() => {
                    warn!(coin_id = %coin_id, currency, error = %e, "Data validation error");
                }
                Err(e) => {
                    warn!(coin_id = %coin_id, currency, error = %e, "Failed to fetch market data");
                }
            }

            outcomes.push(PairOutcome {
                coin_id: coin_id.clone(),
                currency: currency.to_string(),
                result,
            });
        }

        outcomes
    }
}
