//! CoinGecko market data client.
//!
//! Secondary upstream, used when every Mobula listing strategy has failed.
//! The free `coins/markets` endpoint caps pages at a fixed size, so a full
//! listing is assembled from sequential pages with a generous delay between
//! them (the free tier rate limit is strict). A page failure after the
//! first keeps the partial result instead of discarding collected pages.

mod models;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;

use crate::errors::MarketDataError;
use crate::models::RawAsset;
use crate::provider::http::RetryingFetcher;
use crate::resolver::FetchStrategy;

use models::CoinGeckoMarket;

pub const PROVIDER_NAME: &str = "coingecko";

/// Client for the CoinGecko HTTP API.
pub struct CoinGeckoProvider {
    fetcher: RetryingFetcher,
    base_url: String,
    page_delay: Duration,
}

impl CoinGeckoProvider {
    pub fn new(fetcher: RetryingFetcher, base_url: String, page_delay: Duration) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_delay,
        }
    }

    /// Fetch one page of the USD market listing, ordered by market cap.
    pub async fn markets_page(
        &self,
        per_page: usize,
        page: usize,
    ) -> Result<Vec<RawAsset>, MarketDataError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page={}&sparkline=false",
            self.base_url, per_page, page
        );
        let body = self.fetcher.get(&url).await?;
        let markets: Vec<CoinGeckoMarket> =
            serde_json::from_str(&body).map_err(|e| MarketDataError::MalformedPayload {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })?;
        Ok(markets.into_iter().map(CoinGeckoMarket::into_raw).collect())
    }

    /// Fetch `pages` sequential pages of `per_page` assets each.
    ///
    /// Fails only when the first page fails; a later page failure logs and
    /// returns what was collected so far. A short page ends the walk early.
    pub async fn paged_markets(
        &self,
        per_page: usize,
        pages: usize,
    ) -> Result<Vec<RawAsset>, MarketDataError> {
        let mut collected = Vec::with_capacity(per_page * pages);

        for page in 1..=pages {
            if page > 1 {
                tokio::time::sleep(self.page_delay).await;
            }

            match self.markets_page(per_page, page).await {
                Ok(assets) => {
                    let short_page = assets.len() < per_page;
                    collected.extend(assets);
                    if short_page {
                        break;
                    }
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(
                        "CoinGecko page {}/{} failed: {}. Keeping {} collected assets.",
                        page,
                        pages,
                        e,
                        collected.len()
                    );
                    break;
                }
            }
        }

        Ok(collected)
    }
}

/// The paged full-listing walk as a fallback-chain strategy.
pub struct CoinGeckoPagedMarkets {
    provider: Arc<CoinGeckoProvider>,
    per_page: usize,
    pages: usize,
}

impl CoinGeckoPagedMarkets {
    pub fn new(provider: Arc<CoinGeckoProvider>, per_page: usize, pages: usize) -> Self {
        Self {
            provider,
            per_page,
            pages,
        }
    }
}

#[async_trait]
impl FetchStrategy for CoinGeckoPagedMarkets {
    fn id(&self) -> &'static str {
        "coingecko-paged-markets"
    }

    fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch(&self) -> Result<Vec<RawAsset>, MarketDataError> {
        self.provider.paged_markets(self.per_page, self.pages).await
    }
}
