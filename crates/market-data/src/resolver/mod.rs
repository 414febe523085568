//! Ordered fallback resolution across fetch strategies.
//!
//! A [`FetchStrategy`] is one self-contained way of obtaining raw asset
//! records (an endpoint plus its parameters). The [`FallbackResolver`]
//! walks an ordered list of strategies and applies an [`AcceptancePolicy`]
//! to each result, so a strategy that technically succeeds but returns a
//! suspiciously short list is treated as degraded and the next strategy
//! still gets a chance.

mod fallback;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::RawAsset;

pub use fallback::{FallbackResolver, Resolution};

/// One way of fetching raw asset records.
///
/// Implementations are self-contained: the strategy carries its own
/// parameters (sort order, symbol set, page plan) and its own provider
/// client. Must be cheap to call `fetch` on repeatedly.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Stable identifier for logs and diagnostics, e.g. `mobula-market-cap`.
    fn id(&self) -> &'static str;

    /// The upstream provider this strategy talks to.
    fn provider(&self) -> &'static str;

    /// Execute the fetch.
    async fn fetch(&self) -> Result<Vec<RawAsset>, MarketDataError>;
}

/// Decides whether a strategy's successful result is good enough to stop
/// the fallback walk.
#[derive(Debug, Clone, Copy)]
pub struct AcceptancePolicy {
    requested: usize,
    numerator: usize,
    denominator: usize,
}

impl AcceptancePolicy {
    /// Accept results covering at least `numerator/denominator` of
    /// `requested` records.
    pub fn fraction_of(requested: usize, numerator: usize, denominator: usize) -> Self {
        Self {
            requested,
            numerator,
            denominator: denominator.max(1),
        }
    }

    /// Accept any non-empty result.
    pub fn non_empty() -> Self {
        Self {
            requested: 1,
            numerator: 1,
            denominator: 1,
        }
    }

    /// The minimum record count this policy accepts (rounded up, at
    /// least 1).
    pub fn threshold(&self) -> usize {
        let exact = self.requested * self.numerator;
        exact.div_ceil(self.denominator).max(1)
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.threshold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_threshold_rounds_up() {
        // 5/6 of 300 = 250 exactly
        assert_eq!(AcceptancePolicy::fraction_of(300, 5, 6).threshold(), 250);
        // 5/6 of 100 = 83.33, rounded up
        assert_eq!(AcceptancePolicy::fraction_of(100, 5, 6).threshold(), 84);
        assert_eq!(AcceptancePolicy::fraction_of(0, 5, 6).threshold(), 1);
    }

    #[test]
    fn test_acceptance_boundaries() {
        let policy = AcceptancePolicy::fraction_of(300, 5, 6);
        assert!(!policy.accepts(249));
        assert!(policy.accepts(250));
        assert!(policy.accepts(300));
    }

    #[test]
    fn test_non_empty_policy() {
        let policy = AcceptancePolicy::non_empty();
        assert!(!policy.accepts(0));
        assert!(policy.accepts(1));
    }
}
