//! Upstream market data providers.
//!
//! Each provider module owns its HTTP client, its response models, and the
//! fetch strategies built on its endpoints. The shared retry/backoff
//! plumbing lives in [`http`].

pub mod coingecko;
pub mod http;
pub mod mobula;

pub use coingecko::{CoinGeckoPagedMarkets, CoinGeckoProvider};
pub use http::RetryingFetcher;
pub use mobula::{
    MobulaListFiltered, MobulaMarketList, MobulaPerSymbol, MobulaProvider, MobulaSymbolBatch,
    SortOrder,
};
