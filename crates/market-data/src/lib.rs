//! Market data acquisition and caching for crypto asset dashboards.
//!
//! The crate turns two flaky upstream APIs (Mobula, with CoinGecko as a
//! secondary) into two reliable operations: fetching a ranked snapshot of
//! the top assets, and incrementally refreshing prices for a list the
//! caller already holds.
//!
//! # Data flow
//!
//! ```text
//!             fetch_top_assets                 update_prices
//!                    |                               |
//!              FreshnessCache  <--- hit? ---+   BatchPlanner
//!                    | miss                 |        |  (50-symbol chunks)
//!             FallbackResolver              |  FallbackResolver (per chunk)
//!             /      |       \              |        |
//!      mobula list sorts   coingecko     mobula multi / filtered / single
//!             \      |       /              |        |
//!              Normalizer ------------------+   Normalizer
//!                    |                               |
//!              cache + return                  PriceMerger -> return
//! ```
//!
//! Every fetch path shares the same plumbing: HTTP retries with
//! exponential backoff for rate limits ([`provider::RetryingFetcher`]),
//! ordered strategy fallback with an acceptance threshold
//! ([`resolver::FallbackResolver`]), canonical normalization
//! ([`normalize::Normalizer`]) and a two-tier TTL cache
//! ([`cache::FreshnessCache`]) whose expired entries still serve as a last
//! resort when every upstream is down.
//!
//! # Example
//!
//! ```no_run
//! use coindeck_market_data::{MarketDataService, ServiceConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig {
//!     mobula_api_key: std::env::var("MOBULA_API_KEY").ok(),
//!     ..ServiceConfig::default()
//! };
//! let service = MarketDataService::new(config);
//!
//! let assets = service.fetch_top_assets(None).await?;
//! let refreshed = service.update_prices(&assets).await;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cache;
pub mod errors;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod resolver;
pub mod service;

pub use cache::{CacheStore, FreshnessCache, MemoryStore, SqliteStore};
pub use errors::{MarketDataError, RetryClass};
pub use models::{AssetRecord, RawAsset};
pub use service::{MarketDataService, ServiceConfig};
