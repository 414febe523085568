//! Merging incremental price updates into a known asset list.
//!
//! A price refresh fetches a subset of the assets the caller already holds.
//! The merge reconciles that subset into the full list without dropping
//! unmatched entries and without inventing new ones; discovery of new
//! assets is a full-fetch concern, not a merge concern.

use std::collections::HashMap;

use chrono::Utc;

use crate::models::AssetRecord;

/// Merges a freshly fetched subset of price updates into a larger
/// previously-known asset list.
pub struct PriceMerger;

impl PriceMerger {
    /// Merge `fresh` into `known`.
    ///
    /// Matching is by case-insensitive symbol. For each known asset with a
    /// fresh match, `price`, `change_24h`, `market_cap` and `volume_24h`
    /// are overwritten and `last_updated` is stamped; `previous_price` is
    /// set to the old price only when the new price actually differs, so an
    /// unchanged price never flags a spurious delta. Assets without a match
    /// pass through untouched.
    ///
    /// The merge is total: the output has the same length and the same
    /// identities as `known`, in the same order.
    pub fn merge(known: &[AssetRecord], fresh: &[AssetRecord]) -> Vec<AssetRecord> {
        if fresh.is_empty() {
            return known.to_vec();
        }

        let now = Utc::now();
        let by_symbol: HashMap<String, &AssetRecord> = fresh
            .iter()
            .map(|asset| (asset.symbol.to_uppercase(), asset))
            .collect();

        known
            .iter()
            .map(|asset| match by_symbol.get(&asset.symbol.to_uppercase()) {
                Some(update) => {
                    let price_changed = update.price != asset.price;
                    AssetRecord {
                        previous_price: if price_changed {
                            Some(asset.price)
                        } else {
                            asset.previous_price
                        },
                        price: update.price,
                        change_24h: update.change_24h,
                        market_cap: update.market_cap,
                        volume_24h: update.volume_24h,
                        last_updated: now,
                        ..asset.clone()
                    }
                }
                None => asset.clone(),
            })
            .collect()
    }
}
