//! Response models for the Mobula API.

use serde::Deserialize;
use serde_json::Value;

use crate::models::RawAsset;

/// One asset as returned by `market/list`, `market/multi` or `market/data`.
///
/// Mobula's numeric id is sometimes serialized as a string, so `id` is kept
/// loose and stringified during mapping. Volume appears as either `volume`
/// or `volume_24h` depending on the endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MobulaAsset {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
    #[serde(default, alias = "volume")]
    pub volume_24h: Option<f64>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub logo: Option<String>,
}

impl MobulaAsset {
    pub fn into_raw(self) -> RawAsset {
        RawAsset {
            id: self.id.map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            }),
            name: self.name,
            symbol: self.symbol,
            price: self.price,
            market_cap: self.market_cap,
            change_24h: self.price_change_24h,
            volume_24h: self.volume_24h,
            rank: self.rank,
            logo_url: self.logo,
        }
    }
}

/// The `{ "data": [...] }` envelope the market endpoints wrap their
/// payloads in.
#[derive(Debug, Deserialize)]
pub struct MarketListResponse {
    #[serde(default)]
    pub data: Vec<MobulaAsset>,
}

/// Envelope for the single-asset `market/data` endpoint.
#[derive(Debug, Deserialize)]
pub struct MarketDataResponse {
    pub data: MobulaAsset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_string_ids_both_map() {
        let numeric: MobulaAsset = serde_json::from_str(r#"{"id": 100, "symbol": "BTC"}"#).unwrap();
        let string: MobulaAsset =
            serde_json::from_str(r#"{"id": "bitcoin", "symbol": "BTC"}"#).unwrap();

        assert_eq!(numeric.into_raw().id.as_deref(), Some("100"));
        assert_eq!(string.into_raw().id.as_deref(), Some("bitcoin"));
    }

    #[test]
    fn test_volume_alias() {
        let with_alias: MobulaAsset =
            serde_json::from_str(r#"{"symbol": "BTC", "volume": 12.5}"#).unwrap();
        assert_eq!(with_alias.volume_24h, Some(12.5));
    }

    #[test]
    fn test_missing_data_array_defaults_empty() {
        let response: MarketListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.data.is_empty());
    }
}
