//! Response models for the CoinGecko `coins/markets` endpoint.

use serde::Deserialize;

use crate::models::RawAsset;

#[derive(Debug, Clone, Deserialize)]
pub struct CoinGeckoMarket {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub image: Option<String>,
}

impl CoinGeckoMarket {
    pub fn into_raw(self) -> RawAsset {
        RawAsset {
            id: self.id,
            name: self.name,
            symbol: self.symbol,
            price: self.current_price,
            market_cap: self.market_cap,
            change_24h: self.price_change_percentage_24h,
            volume_24h: self.total_volume,
            rank: self.market_cap_rank,
            logo_url: self.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_mapping() {
        let market: CoinGeckoMarket = serde_json::from_str(
            r#"{
                "id": "bitcoin",
                "symbol": "btc",
                "name": "Bitcoin",
                "current_price": 50000.0,
                "market_cap": 1000000.0,
                "market_cap_rank": 1,
                "total_volume": 500.0,
                "price_change_percentage_24h": -1.5,
                "image": "https://example.com/btc.png"
            }"#,
        )
        .unwrap();

        let raw = market.into_raw();
        assert_eq!(raw.id.as_deref(), Some("bitcoin"));
        assert_eq!(raw.price, Some(50000.0));
        assert_eq!(raw.change_24h, Some(-1.5));
        assert_eq!(raw.volume_24h, Some(500.0));
        assert_eq!(raw.rank, Some(1));
    }
}
