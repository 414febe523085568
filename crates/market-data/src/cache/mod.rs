//! Two-tier freshness cache for asset snapshots.
//!
//! Reads check a fast in-process tier first, then an optional durable
//! store, each with its own time-to-live. Every entry carries the instant
//! it was stored so staleness is judged at read time; a separate
//! last-resort read path ([`FreshnessCache::get_stale`]) serves expired
//! data when every upstream has already failed.
//!
//! Backend failures never surface to callers: a broken durable store
//! degrades reads to a miss and writes to ephemeral-only, with a warning.

mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::models::AssetRecord;

pub use store::{CacheStore, MemoryStore, SqliteStore, StoreError};

/// Default time-to-live for the in-process tier.
pub const DEFAULT_EPHEMERAL_TTL: Duration = Duration::from_secs(5 * 60);
/// Default time-to-live for the durable tier.
pub const DEFAULT_DURABLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// A cached snapshot with its storage instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: Vec<AssetRecord>,
    pub stored_at: DateTime<Utc>,
}

/// Which tier served a cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Ephemeral,
    Durable,
}

/// A successful cache read.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub records: Vec<AssetRecord>,
    pub stored_at: DateTime<Utc>,
    pub tier: CacheTier,
}

/// A cache key derived from the parameters of the request it caches.
///
/// Different limits and different symbol sets must never collide, so the
/// key encodes them. Symbol sets are hashed after sorting, which makes the
/// key insensitive to request order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a full top-assets snapshot of the given size.
    pub fn top_assets(limit: usize) -> Self {
        Self(format!("top-assets:{}", limit))
    }

    /// Key for a snapshot covering a specific set of symbols.
    pub fn symbol_set(symbols: &[String]) -> Self {
        let mut sorted: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        sorted.sort();
        sorted.dedup();
        let digest = md5::compute(sorted.join(","));
        Self(format!("symbols:{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two-tier snapshot cache: a built-in ephemeral map plus an optional
/// injected durable store, each with its own TTL.
pub struct FreshnessCache {
    ephemeral: DashMap<String, CacheEntry>,
    durable: Option<Arc<dyn CacheStore>>,
    ephemeral_ttl: Duration,
    durable_ttl: Duration,
}

impl Default for FreshnessCache {
    fn default() -> Self {
        Self::new(DEFAULT_EPHEMERAL_TTL, DEFAULT_DURABLE_TTL)
    }
}

impl FreshnessCache {
    /// Ephemeral-only cache with explicit TTLs.
    pub fn new(ephemeral_ttl: Duration, durable_ttl: Duration) -> Self {
        Self {
            ephemeral: DashMap::new(),
            durable: None,
            ephemeral_ttl,
            durable_ttl,
        }
    }

    /// Attach a durable second tier.
    pub fn with_durable(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Read `key`, honoring each tier's TTL.
    ///
    /// A fresh ephemeral entry wins. Otherwise the durable tier is
    /// consulted; a fresh durable entry is copied back into the ephemeral
    /// tier so the next read is cheap. Expired entries in either tier are
    /// left in place for [`Self::get_stale`] and reported as a miss here.
    pub fn get(&self, key: &CacheKey) -> Option<CacheHit> {
        if let Some(entry) = self.ephemeral.get(key.as_str()) {
            if is_fresh(&entry, self.ephemeral_ttl) {
                return Some(hit(&entry, CacheTier::Ephemeral));
            }
            debug!("Ephemeral entry for {} is stale", key);
        }

        let entry = self.load_durable(key)?;
        if is_fresh(&entry, self.durable_ttl) {
            self.ephemeral.insert(key.as_str().to_string(), entry.clone());
            return Some(hit(&entry, CacheTier::Durable));
        }
        debug!("Durable entry for {} is stale", key);
        None
    }

    /// Last-resort read: return whatever is stored under `key`, however
    /// old. Used only after every upstream strategy has failed.
    pub fn get_stale(&self, key: &CacheKey) -> Option<CacheHit> {
        if let Some(entry) = self.ephemeral.get(key.as_str()) {
            return Some(hit(&entry, CacheTier::Ephemeral));
        }
        self.load_durable(key)
            .map(|entry| hit(&entry, CacheTier::Durable))
    }

    /// Store `records` under `key` in both tiers, stamped now.
    pub fn put(&self, key: &CacheKey, records: &[AssetRecord]) {
        let entry = CacheEntry {
            payload: records.to_vec(),
            stored_at: Utc::now(),
        };

        self.ephemeral
            .insert(key.as_str().to_string(), entry.clone());

        if let Some(store) = &self.durable {
            if let Err(e) = store.save(key.as_str(), &entry) {
                warn!("Durable cache write for {} failed: {}", key, e);
            }
        }
    }

    /// Drop every ephemeral entry. The durable tier is left untouched.
    pub fn clear_ephemeral(&self) {
        self.ephemeral.clear();
    }

    fn load_durable(&self, key: &CacheKey) -> Option<CacheEntry> {
        let store = self.durable.as_ref()?;
        match store.load(key.as_str()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Durable cache read for {} failed: {}", key, e);
                None
            }
        }
    }
}

fn is_fresh(entry: &CacheEntry, ttl: Duration) -> bool {
    let age = Utc::now().signed_duration_since(entry.stored_at);
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => age <= ttl,
        Err(_) => true, // TTL too large to represent; treat as no expiry
    }
}

fn hit(entry: &CacheEntry, tier: CacheTier) -> CacheHit {
    CacheHit {
        records: entry.payload.clone(),
        stored_at: entry.stored_at,
        tier,
    }
}
