//! Cache module for storing API responses to disk
//!
//! Each coin/currency pair owns one cached snapshot. An entry stays usable while its age,
//! taken from the file modification time, is below the configured expiry.

mod store;

pub use store::{cache_key, CachedData, FileCache, MemoryCache, SnapshotCache, DEFAULT_CACHE_DIR};
