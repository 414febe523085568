use std::sync::Arc;

use log::{debug, info, warn};

use crate::errors::{MarketDataError, RetryClass};
use crate::models::RawAsset;

use super::{AcceptancePolicy, FetchStrategy};

/// Outcome of a fallback walk.
#[derive(Debug)]
pub enum Resolution {
    /// A strategy produced an acceptable result.
    Accepted {
        records: Vec<RawAsset>,
        strategy: &'static str,
        provider: &'static str,
    },
    /// Every strategy was tried and none was accepted. Carries the best
    /// partial result seen (possibly empty) and diagnostics from the last
    /// failure.
    AllFailed {
        partial: Vec<RawAsset>,
        partial_strategy: Option<&'static str>,
        last_strategy: &'static str,
        last_error: Option<MarketDataError>,
    },
}

/// Walks an ordered strategy list until one result is accepted.
///
/// Strategies are tried strictly in order. A successful fetch that falls
/// short of the acceptance policy is remembered as a partial candidate and
/// the walk continues; the largest partial is returned if nothing is ever
/// accepted, so a degraded upstream still yields its best data. A
/// [`RetryClass::Never`] error ends the walk immediately.
pub struct FallbackResolver {
    strategies: Vec<Arc<dyn FetchStrategy>>,
    policy: AcceptancePolicy,
}

impl FallbackResolver {
    pub fn new(strategies: Vec<Arc<dyn FetchStrategy>>, policy: AcceptancePolicy) -> Self {
        Self { strategies, policy }
    }

    pub async fn resolve(&self) -> Resolution {
        let mut best_partial: Vec<RawAsset> = Vec::new();
        let mut partial_strategy: Option<&'static str> = None;
        let mut last_strategy: &'static str = "none";
        let mut last_error: Option<MarketDataError> = None;

        for strategy in &self.strategies {
            last_strategy = strategy.id();
            debug!("Trying strategy {} ({})", strategy.id(), strategy.provider());

            match strategy.fetch().await {
                Ok(records) if self.policy.accepts(records.len()) => {
                    info!(
                        "Strategy {} accepted with {} records",
                        strategy.id(),
                        records.len()
                    );
                    return Resolution::Accepted {
                        records,
                        strategy: strategy.id(),
                        provider: strategy.provider(),
                    };
                }
                Ok(records) => {
                    warn!(
                        "Strategy {} returned {} records, below threshold {}. Trying next.",
                        strategy.id(),
                        records.len(),
                        self.policy.threshold()
                    );
                    if records.len() > best_partial.len() {
                        best_partial = records;
                        partial_strategy = Some(strategy.id());
                    }
                }
                Err(e) => {
                    warn!("Strategy {} failed: {}", strategy.id(), e);
                    let terminal = e.retry_class() == RetryClass::Never;
                    last_error = Some(e);
                    if terminal {
                        break;
                    }
                }
            }
        }

        Resolution::AllFailed {
            partial: best_partial,
            partial_strategy,
            last_strategy,
            last_error,
        }
    }
}
