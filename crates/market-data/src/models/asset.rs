use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical asset record handed back by the crate.
///
/// Produced by the normalizer from provider-specific raw records; after
/// normalization `id` and `symbol` are never empty and all numeric fields
/// are finite. Lists of records are always ordered by descending
/// `market_cap`, ties broken by ascending `rank`.
///
/// Serialized with camelCase names so snapshots round-trip unchanged
/// through the durable cache tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// Stable identifier. Provider id when present, else the symbol, else
    /// a synthetic `<source>-<index>`.
    pub id: String,
    /// Display name. Falls back to the symbol when the provider omits it.
    pub name: String,
    /// Trading symbol, upper-cased. Required; records without one are
    /// dropped during normalization.
    pub symbol: String,
    /// Last traded price in USD. Zero when the provider had no valid value.
    pub price: f64,
    /// Market capitalization in USD. Zero when missing or invalid.
    pub market_cap: f64,
    /// 24h price change in percent. May be negative; zero when missing.
    pub change_24h: f64,
    /// 24h traded volume in USD. Zero when missing or invalid.
    pub volume_24h: f64,
    /// Market-cap rank. Provider rank when present, else positional
    /// index + 1. Strictly positive; used as the tiebreak in ordering.
    pub rank: u32,
    /// Logo URL, empty string when the provider has none.
    #[serde(default)]
    pub logo_url: String,
    /// Price before the most recent merge that actually changed it.
    /// Present only after at least one merge cycle observed a change;
    /// consumers use it for delta/animation display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_price: Option<f64>,
    /// When this record was last normalized or merged.
    pub last_updated: DateTime<Utc>,
}

/// Provider-neutral raw record.
///
/// Every field is optional: each provider maps its own response model into
/// this shape and the normalizer decides defaults. Presence (not value)
/// drives defaulting, so a genuine zero price survives normalization.
#[derive(Debug, Clone, Default)]
pub struct RawAsset {
    pub id: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub change_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub rank: Option<u32>,
    pub logo_url: Option<String>,
}
