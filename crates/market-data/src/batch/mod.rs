//! Chunked, rate-limit-friendly dispatch of large symbol sets.
//!
//! Upstream batch endpoints cap the number of assets per request, and the
//! bulk endpoints share a rate limit. [`BatchPlanner`] splits a requested
//! id set into bounded chunks and dispatches them strictly sequentially
//! with a fixed inter-chunk delay. A failed chunk is logged and skipped;
//! it never aborts the remaining chunks.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::errors::MarketDataError;

/// Splits id sets into bounded chunks and sequences their dispatch.
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    max_chunk_size: usize,
    inter_chunk_delay: Duration,
}

impl BatchPlanner {
    /// Create a planner.
    ///
    /// `max_chunk_size` must be at least 1; it is clamped to 1 otherwise.
    pub fn new(max_chunk_size: usize, inter_chunk_delay: Duration) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
            inter_chunk_delay,
        }
    }

    /// Partition `ids` into ordered chunks.
    ///
    /// Produces `ceil(ids.len() / max_chunk_size)` chunks, each of size
    /// `<= max_chunk_size`, preserving input order. The concatenation of
    /// all chunks equals the input.
    pub fn plan(&self, ids: &[String]) -> Vec<Vec<String>> {
        ids.chunks(self.max_chunk_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Dispatch `fetch` over every chunk, strictly sequentially, sleeping
    /// `inter_chunk_delay` between chunks.
    ///
    /// Successful chunk results are concatenated in chunk order. A chunk
    /// that fails is logged and skipped. Returns the accumulated items and
    /// the number of failed chunks.
    pub async fn run<T, F, Fut>(&self, ids: &[String], fetch: F) -> (Vec<T>, usize)
    where
        F: Fn(Vec<String>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, MarketDataError>>,
    {
        let chunks = self.plan(ids);
        let total = chunks.len();
        let mut collected = Vec::new();
        let mut failed = 0;

        for (index, chunk) in chunks.into_iter().enumerate() {
            let size = chunk.len();
            match fetch(chunk).await {
                Ok(items) => {
                    debug!(
                        "Chunk {}/{} ({} ids) returned {} items",
                        index + 1,
                        total,
                        size,
                        items.len()
                    );
                    collected.extend(items);
                }
                Err(e) => {
                    warn!("Chunk {}/{} failed: {}. Skipping.", index + 1, total, e);
                    failed += 1;
                }
            }

            if index + 1 < total {
                tokio::time::sleep(self.inter_chunk_delay).await;
            }
        }

        (collected, failed)
    }
}
