//! Normalization of raw provider records into canonical [`AssetRecord`]s.
//!
//! Providers disagree about field names, missing data and garbage values;
//! every silent "default to 0 / empty string" decision lives here in a
//! single validation pass instead of being scattered through mapping code.

use std::collections::HashSet;

use chrono::Utc;
use log::warn;

use crate::models::{AssetRecord, RawAsset};

/// Converts heterogeneous provider records into canonical asset records.
pub struct Normalizer;

impl Normalizer {
    /// Normalize `raw` records from `source`.
    ///
    /// - Records without a usable symbol are logged and skipped; the batch
    ///   never fails.
    /// - A missing name falls back to the symbol.
    /// - Missing or non-finite numeric fields default to 0. Price, market
    ///   cap and volume are additionally clamped to be non-negative. A
    ///   present zero is kept as valid data.
    /// - `id` is the provider id, else the symbol, else `<source>-<index>`;
    ///   `rank` is the provider rank, else `index + 1`.
    /// - Duplicates (by id) keep the first occurrence. Output is sorted by
    ///   descending market cap, ties broken by ascending rank, and
    ///   truncated to `limit` when given.
    pub fn normalize(raw: Vec<RawAsset>, source: &str, limit: Option<usize>) -> Vec<AssetRecord> {
        let now = Utc::now();
        let mut seen: HashSet<String> = HashSet::new();
        let mut records: Vec<AssetRecord> = Vec::with_capacity(raw.len());

        for (index, item) in raw.into_iter().enumerate() {
            let symbol = match item.symbol.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s.to_uppercase(),
                _ => {
                    warn!("Skipping record {} from {}: no usable symbol", index, source);
                    continue;
                }
            };

            let name = match item.name.as_deref().map(str::trim) {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => symbol.clone(),
            };

            let id = item
                .id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| symbol.clone());
            let id = if id.is_empty() {
                format!("{}-{}", source, index)
            } else {
                id
            };

            if !seen.insert(id.clone()) {
                continue;
            }

            records.push(AssetRecord {
                id,
                name,
                symbol,
                price: non_negative(item.price),
                market_cap: non_negative(item.market_cap),
                change_24h: finite_or_zero(item.change_24h),
                volume_24h: non_negative(item.volume_24h),
                rank: item.rank.filter(|r| *r > 0).unwrap_or(index as u32 + 1),
                logo_url: item.logo_url.unwrap_or_default(),
                previous_price: None,
                last_updated: now,
            });
        }

        records.sort_by(|a, b| {
            b.market_cap
                .partial_cmp(&a.market_cap)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.rank.cmp(&b.rank))
        });

        if let Some(limit) = limit {
            records.truncate(limit);
        }

        records
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    finite_or_zero(value).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(symbol: Option<&str>, name: Option<&str>, market_cap: Option<f64>) -> RawAsset {
        RawAsset {
            symbol: symbol.map(str::to_string),
            name: name.map(str::to_string),
            market_cap,
            ..Default::default()
        }
    }

    #[test]
    fn test_drops_records_without_symbol() {
        let input = vec![
            raw(Some("btc"), Some("Bitcoin"), Some(1000.0)),
            raw(None, Some("Mystery Coin"), Some(2000.0)),
            raw(Some("  "), None, Some(3000.0)),
            raw(Some("eth"), None, Some(500.0)),
        ];

        let out = Normalizer::normalize(input, "mobula", None);

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| !r.id.is_empty() && !r.symbol.is_empty()));
        assert_eq!(out[0].symbol, "BTC");
        // Name falls back to symbol
        assert_eq!(out[1].name, "ETH");
    }

    #[test]
    fn test_numeric_defaults_and_clamping() {
        let input = vec![RawAsset {
            symbol: Some("XYZ".to_string()),
            name: Some("Xyz".to_string()),
            price: Some(f64::NAN),
            market_cap: Some(-5.0),
            change_24h: Some(-12.5),
            volume_24h: None,
            ..Default::default()
        }];

        let out = Normalizer::normalize(input, "mobula", None);

        assert_eq!(out[0].price, 0.0);
        assert_eq!(out[0].market_cap, 0.0);
        assert_eq!(out[0].change_24h, -12.5); // change may be negative
        assert_eq!(out[0].volume_24h, 0.0);
    }

    #[test]
    fn test_present_zero_price_is_kept() {
        let input = vec![RawAsset {
            symbol: Some("ZERO".to_string()),
            price: Some(0.0),
            ..Default::default()
        }];

        let out = Normalizer::normalize(input, "mobula", None);
        assert_eq!(out[0].price, 0.0);
    }

    #[test]
    fn test_synthetic_id_and_rank_assignment() {
        let input = vec![RawAsset {
            id: Some("   ".to_string()),
            symbol: Some("AAA".to_string()),
            rank: None,
            ..Default::default()
        }];

        let out = Normalizer::normalize(input, "mobula", None);

        // Blank id falls back to the symbol; rank to index + 1
        assert_eq!(out[0].id, "AAA");
        assert_eq!(out[0].rank, 1);
    }

    #[test]
    fn test_dedupes_by_id_first_wins() {
        let input = vec![
            RawAsset {
                id: Some("bitcoin".to_string()),
                symbol: Some("BTC".to_string()),
                price: Some(100.0),
                ..Default::default()
            },
            RawAsset {
                id: Some("bitcoin".to_string()),
                symbol: Some("BTC".to_string()),
                price: Some(999.0),
                ..Default::default()
            },
        ];

        let out = Normalizer::normalize(input, "mobula", None);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].price, 100.0);
    }

    #[test]
    fn test_sorted_by_market_cap_then_rank() {
        let input = vec![
            RawAsset {
                symbol: Some("MID".to_string()),
                market_cap: Some(500.0),
                rank: Some(9),
                ..Default::default()
            },
            RawAsset {
                symbol: Some("TOP".to_string()),
                market_cap: Some(900.0),
                rank: Some(1),
                ..Default::default()
            },
            RawAsset {
                symbol: Some("TIE".to_string()),
                market_cap: Some(500.0),
                rank: Some(3),
                ..Default::default()
            },
        ];

        let out = Normalizer::normalize(input, "mobula", None);

        assert_eq!(out[0].symbol, "TOP");
        assert_eq!(out[1].symbol, "TIE"); // same cap, lower rank first
        assert_eq!(out[2].symbol, "MID");

        for pair in out.windows(2) {
            assert!(
                pair[0].market_cap > pair[1].market_cap
                    || (pair[0].market_cap == pair[1].market_cap
                        && pair[0].rank <= pair[1].rank)
            );
        }
    }

    #[test]
    fn test_truncates_to_limit() {
        let input: Vec<RawAsset> = (0..10)
            .map(|i| RawAsset {
                symbol: Some(format!("S{}", i)),
                market_cap: Some(i as f64),
                ..Default::default()
            })
            .collect();

        let out = Normalizer::normalize(input, "mobula", Some(4));

        assert_eq!(out.len(), 4);
        assert_eq!(out[0].symbol, "S9"); // highest cap kept
    }
}
