//! Mobula market data client.
//!
//! Primary upstream. Three endpoints are used:
//!
//! | Endpoint       | Purpose                                   |
//! |----------------|-------------------------------------------|
//! | `market/list`  | Ranked asset listings (sortable)          |
//! | `market/multi` | Batched quotes for an explicit symbol set |
//! | `market/data`  | Single-asset quote                        |
//!
//! The fetch strategies built on top of these endpoints live here too, so
//! everything Mobula-shaped stays in one place.

mod models;

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::models::RawAsset;
use crate::provider::http::RetryingFetcher;
use crate::resolver::FetchStrategy;

use models::{MarketDataResponse, MobulaAsset};

pub const PROVIDER_NAME: &str = "mobula";

/// Sort orders accepted by `market/list`.
///
/// Market cap is the canonical ranking; the others exist because the
/// market-cap sort intermittently returns short lists upstream, and a
/// differently-sorted listing of the same universe usually does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    MarketCap,
    CirculatingSupply,
    Volume,
}

impl SortOrder {
    fn query_value(&self) -> &'static str {
        match self {
            SortOrder::MarketCap => "market_cap",
            SortOrder::CirculatingSupply => "circulating_supply",
            SortOrder::Volume => "volume",
        }
    }

    fn strategy_id(&self) -> &'static str {
        match self {
            SortOrder::MarketCap => "mobula-market-cap",
            SortOrder::CirculatingSupply => "mobula-circulating-supply",
            SortOrder::Volume => "mobula-volume",
        }
    }
}

/// Client for the Mobula HTTP API.
pub struct MobulaProvider {
    fetcher: RetryingFetcher,
    base_url: String,
}

impl MobulaProvider {
    pub fn new(fetcher: RetryingFetcher, base_url: String) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a ranked listing of up to `limit` assets.
    pub async fn market_list(
        &self,
        order: SortOrder,
        limit: usize,
    ) -> Result<Vec<RawAsset>, MarketDataError> {
        let url = format!(
            "{}/market/list?order={}&limit={}",
            self.base_url,
            order.query_value(),
            limit
        );
        let body = self.fetcher.get(&url).await?;
        Ok(parse_asset_list(&body)?
            .into_iter()
            .map(MobulaAsset::into_raw)
            .collect())
    }

    /// Fetch quotes for an explicit symbol set in one request.
    pub async fn market_batch(
        &self,
        symbols: &[String],
    ) -> Result<Vec<RawAsset>, MarketDataError> {
        let assets = symbols.join(",");
        let url = format!(
            "{}/market/multi?assets={}",
            self.base_url,
            urlencoding::encode(&assets)
        );
        let body = self.fetcher.get(&url).await?;
        Ok(parse_asset_list(&body)?
            .into_iter()
            .map(MobulaAsset::into_raw)
            .collect())
    }

    /// Fetch a single asset's quote.
    pub async fn market_single(&self, symbol: &str) -> Result<RawAsset, MarketDataError> {
        let url = format!(
            "{}/market/data?asset={}",
            self.base_url,
            urlencoding::encode(symbol)
        );
        let body = self.fetcher.get(&url).await?;
        let response: MarketDataResponse = serde_json::from_str(&body).map_err(|e| {
            MarketDataError::MalformedPayload {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(response.data.into_raw())
    }
}

/// Parse a market payload, tolerating both the documented `{ "data": [...] }`
/// envelope and a bare top-level array.
fn parse_asset_list(body: &str) -> Result<Vec<MobulaAsset>, MarketDataError> {
    let malformed = |message: String| MarketDataError::MalformedPayload {
        provider: PROVIDER_NAME.to_string(),
        message,
    };

    let value: Value = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    match value {
        Value::Array(_) => serde_json::from_value(value).map_err(|e| malformed(e.to_string())),
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Array(_)) => {
                serde_json::from_value(data).map_err(|e| malformed(e.to_string()))
            }
            _ => Err(malformed("no data array in response".to_string())),
        },
        _ => Err(malformed("expected object or array".to_string())),
    }
}

/// `market/list` with a given sort order, as a fallback-chain strategy.
pub struct MobulaMarketList {
    provider: Arc<MobulaProvider>,
    order: SortOrder,
    limit: usize,
}

impl MobulaMarketList {
    pub fn new(provider: Arc<MobulaProvider>, order: SortOrder, limit: usize) -> Self {
        Self {
            provider,
            order,
            limit,
        }
    }
}

#[async_trait]
impl FetchStrategy for MobulaMarketList {
    fn id(&self) -> &'static str {
        self.order.strategy_id()
    }

    fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch(&self) -> Result<Vec<RawAsset>, MarketDataError> {
        self.provider.market_list(self.order, self.limit).await
    }
}

/// One `market/multi` call for a symbol set.
pub struct MobulaSymbolBatch {
    provider: Arc<MobulaProvider>,
    symbols: Vec<String>,
}

impl MobulaSymbolBatch {
    pub fn new(provider: Arc<MobulaProvider>, symbols: Vec<String>) -> Self {
        Self { provider, symbols }
    }
}

#[async_trait]
impl FetchStrategy for MobulaSymbolBatch {
    fn id(&self) -> &'static str {
        "mobula-symbol-batch"
    }

    fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch(&self) -> Result<Vec<RawAsset>, MarketDataError> {
        self.provider.market_batch(&self.symbols).await
    }
}

/// Fallback when `market/multi` is down: pull a broad listing and keep only
/// the requested symbols.
pub struct MobulaListFiltered {
    provider: Arc<MobulaProvider>,
    symbols: Vec<String>,
    scan_limit: usize,
}

impl MobulaListFiltered {
    pub fn new(provider: Arc<MobulaProvider>, symbols: Vec<String>, scan_limit: usize) -> Self {
        Self {
            provider,
            symbols,
            scan_limit,
        }
    }
}

#[async_trait]
impl FetchStrategy for MobulaListFiltered {
    fn id(&self) -> &'static str {
        "mobula-list-filtered"
    }

    fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch(&self) -> Result<Vec<RawAsset>, MarketDataError> {
        let wanted: std::collections::HashSet<String> =
            self.symbols.iter().map(|s| s.to_uppercase()).collect();

        let listing = self
            .provider
            .market_list(SortOrder::MarketCap, self.scan_limit)
            .await?;

        let filtered: Vec<RawAsset> = listing
            .into_iter()
            .filter(|raw| {
                raw.symbol
                    .as_deref()
                    .is_some_and(|s| wanted.contains(&s.trim().to_uppercase()))
            })
            .collect();

        debug!(
            "List-filtered fallback matched {}/{} requested symbols",
            filtered.len(),
            wanted.len()
        );
        Ok(filtered)
    }
}

/// Last-ditch fallback: one `market/data` call per symbol, issued
/// concurrently. Individual failures drop that symbol rather than failing
/// the strategy; the strategy fails only when nothing resolves.
pub struct MobulaPerSymbol {
    provider: Arc<MobulaProvider>,
    symbols: Vec<String>,
}

impl MobulaPerSymbol {
    pub fn new(provider: Arc<MobulaProvider>, symbols: Vec<String>) -> Self {
        Self { provider, symbols }
    }
}

#[async_trait]
impl FetchStrategy for MobulaPerSymbol {
    fn id(&self) -> &'static str {
        "mobula-per-symbol"
    }

    fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch(&self) -> Result<Vec<RawAsset>, MarketDataError> {
        let futures = self
            .symbols
            .iter()
            .map(|symbol| self.provider.market_single(symbol));
        let results = futures::future::join_all(futures).await;

        let mut records = Vec::new();
        let mut last_error = None;
        for result in results {
            match result {
                Ok(raw) => records.push(raw),
                Err(e) => last_error = Some(e),
            }
        }

        if records.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        Ok(records)
    }
}
