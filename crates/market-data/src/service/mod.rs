//! The public operations: full snapshot fetch and incremental price update.
//!
//! [`MarketDataService`] wires the providers, the fallback resolver, the
//! batch planner, the normalizer, the merger and the freshness cache into
//! the two operations callers actually use:
//!
//! - [`fetch_top_assets`](MarketDataService::fetch_top_assets): cache-first
//!   full snapshot of the top N assets, with a strategy fallback chain and
//!   a stale-cache last resort behind it.
//! - [`update_prices`](MarketDataService::update_prices): best-effort
//!   incremental refresh of the highest-ranked assets in a list the caller
//!   already holds. Never fails; at worst it returns the input unchanged.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::batch::BatchPlanner;
use crate::cache::{CacheKey, CacheStore, FreshnessCache, DEFAULT_DURABLE_TTL, DEFAULT_EPHEMERAL_TTL};
use crate::errors::MarketDataError;
use crate::merge::PriceMerger;
use crate::models::AssetRecord;
use crate::normalize::Normalizer;
use crate::provider::{
    CoinGeckoPagedMarkets, CoinGeckoProvider, MobulaListFiltered, MobulaMarketList,
    MobulaPerSymbol, MobulaProvider, MobulaSymbolBatch, RetryingFetcher, SortOrder,
};
use crate::resolver::{AcceptancePolicy, FallbackResolver, FetchStrategy, Resolution};

const MOBULA_BASE_URL: &str = "https://api.mobula.io/api/1";
const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Tuning knobs for [`MarketDataService`].
///
/// The defaults match the upstream free-tier limits this crate is built
/// around; most deployments only set `mobula_api_key`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bearer token for Mobula. Optional; without it the free quota applies.
    pub mobula_api_key: Option<String>,
    pub mobula_base_url: String,
    pub coingecko_base_url: String,
    /// Snapshot size when the caller does not specify one.
    pub default_limit: usize,
    /// A listing is accepted when it covers at least
    /// `accept_numerator / accept_denominator` of the requested size.
    pub accept_numerator: usize,
    pub accept_denominator: usize,
    /// How many of the highest-ranked assets a price update refreshes.
    pub update_top_n: usize,
    /// Maximum symbols per batched quote request.
    pub chunk_size: usize,
    /// Pause between successive quote chunks.
    pub inter_chunk_delay: Duration,
    /// Pause between successive CoinGecko listing pages.
    pub page_delay: Duration,
    /// CoinGecko listing page size.
    pub per_page: usize,
    /// Total tries per HTTP request (rate limits and transport errors).
    pub max_attempts: u32,
    /// Backoff before the first HTTP retry; doubles per retry.
    pub initial_backoff: Duration,
    pub request_timeout: Duration,
    pub ephemeral_ttl: Duration,
    pub durable_ttl: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mobula_api_key: None,
            mobula_base_url: MOBULA_BASE_URL.to_string(),
            coingecko_base_url: COINGECKO_BASE_URL.to_string(),
            default_limit: 300,
            accept_numerator: 5,
            accept_denominator: 6,
            update_top_n: 75,
            chunk_size: 50,
            inter_chunk_delay: Duration::from_millis(300),
            page_delay: Duration::from_secs(3),
            per_page: 100,
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            request_timeout: Duration::from_secs(15),
            ephemeral_ttl: DEFAULT_EPHEMERAL_TTL,
            durable_ttl: DEFAULT_DURABLE_TTL,
        }
    }
}

/// Facade over the acquisition pipeline.
pub struct MarketDataService {
    mobula: Arc<MobulaProvider>,
    coingecko: Arc<CoinGeckoProvider>,
    cache: FreshnessCache,
    config: ServiceConfig,
}

impl MarketDataService {
    /// Service with an ephemeral-only cache.
    pub fn new(config: ServiceConfig) -> Self {
        let cache = FreshnessCache::new(config.ephemeral_ttl, config.durable_ttl);
        Self::build(config, cache)
    }

    /// Service with a durable second cache tier behind the ephemeral one.
    pub fn with_durable_store(config: ServiceConfig, store: Arc<dyn CacheStore>) -> Self {
        let cache =
            FreshnessCache::new(config.ephemeral_ttl, config.durable_ttl).with_durable(store);
        Self::build(config, cache)
    }

    fn build(config: ServiceConfig, cache: FreshnessCache) -> Self {
        let mobula_fetcher = RetryingFetcher::new(
            crate::provider::mobula::PROVIDER_NAME,
            config.mobula_api_key.clone(),
            config.max_attempts,
            config.initial_backoff,
            Some(config.request_timeout),
        );
        let coingecko_fetcher = RetryingFetcher::new(
            crate::provider::coingecko::PROVIDER_NAME,
            None,
            config.max_attempts,
            config.initial_backoff,
            Some(config.request_timeout),
        );

        Self {
            mobula: Arc::new(MobulaProvider::new(
                mobula_fetcher,
                config.mobula_base_url.clone(),
            )),
            coingecko: Arc::new(CoinGeckoProvider::new(
                coingecko_fetcher,
                config.coingecko_base_url.clone(),
                config.page_delay,
            )),
            cache,
            config,
        }
    }

    /// Fetch a snapshot of the top `limit` assets by market cap.
    ///
    /// Read order: fresh cache, then the strategy chain (Mobula listings
    /// under three sort orders, then CoinGecko paged markets), then the
    /// best partial result any strategy produced, then stale cache data of
    /// any age. Only when every one of those is empty does this return
    /// [`MarketDataError::UpstreamUnavailable`].
    pub async fn fetch_top_assets(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<AssetRecord>, MarketDataError> {
        let limit = limit.unwrap_or(self.config.default_limit).max(1);
        let key = CacheKey::top_assets(limit);

        if let Some(hit) = self.cache.get(&key) {
            info!("Serving top {} assets from {:?} cache tier", limit, hit.tier);
            return Ok(hit.records);
        }

        let resolver = FallbackResolver::new(
            self.listing_strategies(limit),
            AcceptancePolicy::fraction_of(
                limit,
                self.config.accept_numerator,
                self.config.accept_denominator,
            ),
        );

        match resolver.resolve().await {
            Resolution::Accepted {
                records,
                strategy,
                provider,
            } => {
                let normalized = Normalizer::normalize(records, provider, Some(limit));
                info!(
                    "Fetched {} assets via {} ({})",
                    normalized.len(),
                    strategy,
                    provider
                );
                self.cache.put(&key, &normalized);
                Ok(normalized)
            }
            Resolution::AllFailed {
                partial,
                partial_strategy,
                last_strategy,
                last_error,
            } => {
                if !partial.is_empty() {
                    let source = partial_strategy.unwrap_or(last_strategy);
                    let normalized = Normalizer::normalize(partial, source, Some(limit));
                    if !normalized.is_empty() {
                        warn!(
                            "All strategies degraded; serving partial listing of {} assets from {}",
                            normalized.len(),
                            source
                        );
                        self.cache.put(&key, &normalized);
                        return Ok(normalized);
                    }
                }

                if let Some(stale) = self.cache.get_stale(&key) {
                    warn!(
                        "All strategies failed; serving stale snapshot from {}",
                        stale.stored_at
                    );
                    return Ok(stale.records);
                }

                Err(MarketDataError::UpstreamUnavailable {
                    last_strategy: last_strategy.to_string(),
                    last_status: last_error.as_ref().and_then(|e| e.status()),
                })
            }
        }
    }

    /// Refresh prices for the highest-ranked assets in `current`.
    ///
    /// Best effort by contract: fetch failures are logged and the affected
    /// assets simply keep their existing values. The merged list always has
    /// the same length and identities as the input.
    pub async fn update_prices(&self, current: &[AssetRecord]) -> Vec<AssetRecord> {
        if current.is_empty() {
            return Vec::new();
        }

        let symbols = self.prioritized_symbols(current);
        let planner = BatchPlanner::new(self.config.chunk_size, self.config.inter_chunk_delay);

        let (raw, failed_chunks) = planner
            .run(&symbols, |chunk| {
                let resolver = FallbackResolver::new(
                    self.quote_strategies(chunk),
                    AcceptancePolicy::non_empty(),
                );
                async move {
                    match resolver.resolve().await {
                        Resolution::Accepted { records, .. } => Ok(records),
                        Resolution::AllFailed {
                            partial,
                            last_strategy,
                            last_error,
                            ..
                        } if partial.is_empty() => {
                            Err(last_error.unwrap_or(MarketDataError::UpstreamUnavailable {
                                last_strategy: last_strategy.to_string(),
                                last_status: None,
                            }))
                        }
                        Resolution::AllFailed { partial, .. } => Ok(partial),
                    }
                }
            })
            .await;

        if failed_chunks > 0 {
            warn!("{} quote chunk(s) failed during price update", failed_chunks);
        }
        if raw.is_empty() {
            return current.to_vec();
        }

        let fresh = Normalizer::normalize(raw, crate::provider::mobula::PROVIDER_NAME, None);
        if fresh.is_empty() {
            return current.to_vec();
        }

        self.cache.put(&CacheKey::symbol_set(&symbols), &fresh);
        PriceMerger::merge(current, &fresh)
    }

    /// The ordered listing strategy chain for a full snapshot.
    fn listing_strategies(&self, limit: usize) -> Vec<Arc<dyn FetchStrategy>> {
        let pages = limit.div_ceil(self.config.per_page).max(1);
        vec![
            Arc::new(MobulaMarketList::new(
                self.mobula.clone(),
                SortOrder::MarketCap,
                limit,
            )),
            Arc::new(MobulaMarketList::new(
                self.mobula.clone(),
                SortOrder::CirculatingSupply,
                limit,
            )),
            Arc::new(MobulaMarketList::new(
                self.mobula.clone(),
                SortOrder::Volume,
                limit,
            )),
            Arc::new(CoinGeckoPagedMarkets::new(
                self.coingecko.clone(),
                self.config.per_page,
                pages,
            )),
        ]
    }

    /// The ordered quote strategy chain for one symbol chunk.
    fn quote_strategies(&self, chunk: Vec<String>) -> Vec<Arc<dyn FetchStrategy>> {
        vec![
            Arc::new(MobulaSymbolBatch::new(self.mobula.clone(), chunk.clone())),
            Arc::new(MobulaListFiltered::new(
                self.mobula.clone(),
                chunk.clone(),
                self.config.default_limit,
            )),
            Arc::new(MobulaPerSymbol::new(self.mobula.clone(), chunk)),
        ]
    }

    /// The top `update_top_n` symbols of `current`, by ascending rank.
    fn prioritized_symbols(&self, current: &[AssetRecord]) -> Vec<String> {
        let mut ranked: Vec<&AssetRecord> = current.iter().collect();
        ranked.sort_by_key(|asset| asset.rank);
        ranked
            .into_iter()
            .take(self.config.update_top_n)
            .map(|asset| asset.symbol.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serves a fixed sequence of raw HTTP responses, one per connection,
    /// ignoring the request. Lets tests exercise retry sequences that a
    /// per-route mock cannot express.
    async fn scripted_server(responses: Vec<String>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}", addr)
    }

    fn http_429() -> String {
        "HTTP/1.1 429 Too Many Requests\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            .to_string()
    }

    fn http_200_json(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn fast_config() -> ServiceConfig {
        ServiceConfig {
            // Dead endpoints; tests that expect traffic override these.
            mobula_base_url: "http://127.0.0.1:9".to_string(),
            coingecko_base_url: "http://127.0.0.1:9".to_string(),
            max_attempts: 1,
            initial_backoff: Duration::from_millis(1),
            inter_chunk_delay: Duration::ZERO,
            page_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(2),
            ..ServiceConfig::default()
        }
    }

    fn asset(symbol: &str, rank: u32, price: f64) -> AssetRecord {
        AssetRecord {
            id: symbol.to_lowercase(),
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            price,
            market_cap: 1000.0 / rank as f64,
            change_24h: 0.0,
            volume_24h: 1.0,
            rank,
            logo_url: String::new(),
            previous_price: None,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fetch_survives_rate_limit_burst() {
        // Two 429s then a good listing; the retrying fetcher must absorb
        // the burst inside the first strategy.
        let body = r#"{"data": [{"symbol": "BTC", "market_cap": 2.0}, {"symbol": "ETH", "market_cap": 1.0}]}"#;
        let base = scripted_server(vec![http_429(), http_429(), http_200_json(body)]).await;

        let config = ServiceConfig {
            mobula_base_url: base,
            max_attempts: 3,
            ..fast_config()
        };
        let service = MarketDataService::new(config);

        let assets = service.fetch_top_assets(Some(2)).await.unwrap();

        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].symbol, "BTC");
    }

    #[tokio::test]
    async fn test_fresh_cache_short_circuits_network() {
        // Dead endpoints everywhere; a fresh cache entry must be enough.
        let service = MarketDataService::new(fast_config());
        let key = CacheKey::top_assets(5);
        service.cache.put(&key, &[asset("BTC", 1, 100.0)]);

        let assets = service.fetch_top_assets(Some(5)).await.unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].symbol, "BTC");
    }

    #[tokio::test]
    async fn test_stale_cache_is_last_resort() {
        let config = ServiceConfig {
            ephemeral_ttl: Duration::from_millis(1),
            durable_ttl: Duration::from_millis(1),
            ..fast_config()
        };
        let service = MarketDataService::new(config);
        let key = CacheKey::top_assets(5);
        service.cache.put(&key, &[asset("OLD", 1, 42.0)]);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Entry is expired, upstreams are dead: the stale entry still wins
        // over a hard failure.
        let assets = service.fetch_top_assets(Some(5)).await.unwrap();

        assert_eq!(assets[0].symbol, "OLD");
    }

    #[tokio::test]
    async fn test_everything_down_surfaces_upstream_unavailable() {
        let service = MarketDataService::new(fast_config());

        let err = service.fetch_top_assets(Some(5)).await.unwrap_err();

        match err {
            MarketDataError::UpstreamUnavailable { last_strategy, .. } => {
                assert_eq!(last_strategy, "coingecko-paged-markets");
            }
            other => panic!("expected UpstreamUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_prices_merges_top_ranked_symbols() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/market/multi?assets=BTC%2CETH")
            .with_body(
                r#"{"data": [{"symbol": "BTC", "price": 110.0}, {"symbol": "ETH", "price": 11.0}]}"#,
            )
            .create_async()
            .await;

        let config = ServiceConfig {
            mobula_base_url: server.url(),
            update_top_n: 2,
            ..fast_config()
        };
        let service = MarketDataService::new(config);

        let current = vec![
            asset("BTC", 1, 100.0),
            asset("ETH", 2, 10.0),
            asset("DOGE", 3, 0.1),
        ];
        let merged = service.update_prices(&current).await;

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].price, 110.0);
        assert_eq!(merged[0].previous_price, Some(100.0));
        assert_eq!(merged[1].price, 11.0);
        // Outside the refresh window, untouched
        assert_eq!(merged[2].price, 0.1);
        assert_eq!(merged[2].previous_price, None);
    }

    #[tokio::test]
    async fn test_update_prices_never_fails() {
        // All upstreams dead: the input comes back unchanged.
        let service = MarketDataService::new(fast_config());
        let current = vec![asset("BTC", 1, 100.0), asset("ETH", 2, 10.0)];

        let merged = service.update_prices(&current).await;

        assert_eq!(merged, current);
    }

    #[tokio::test]
    async fn test_update_prices_empty_input() {
        let service = MarketDataService::new(fast_config());
        assert!(service.update_prices(&[]).await.is_empty());
    }
}
