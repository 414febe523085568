//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method, which determines how the
/// retrying fetcher and the fallback resolver handle the error. Retries and
/// strategy fallbacks are internal; the only variant a caller of
/// `fetch_top_assets` ever sees is [`UpstreamUnavailable`](Self::UpstreamUnavailable).
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider rate limited the request (HTTP 429) and the attempt
    /// budget was exhausted. Retried with exponential backoff before
    /// surfacing.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// A transport-level failure (timeout, connection reset, DNS).
    /// Retried with exponential backoff before surfacing.
    #[error("Network error: {message}")]
    TransientNetwork {
        /// Description of the transport failure
        message: String,
    },

    /// The provider returned a non-2xx, non-429 status.
    /// Not retried; the resolver abandons this strategy and tries the next.
    #[error("Upstream error: {provider} returned HTTP {status}")]
    HardUpstream {
        /// The provider that returned the error
        provider: String,
        /// The HTTP status code
        status: u16,
    },

    /// The response parsed as HTTP but failed schema expectations
    /// (no usable record array, wrong shape). Treated as a strategy
    /// failure; the resolver tries the next strategy.
    #[error("Malformed payload from {provider}: {message}")]
    MalformedPayload {
        /// The provider that returned the payload
        provider: String,
        /// Description of the schema violation
        message: String,
    },

    /// Every strategy and every cache tier has been exhausted.
    /// This is the only error surfaced by `fetch_top_assets`; it carries
    /// enough detail to log, while callers are expected to present a
    /// generic "data unavailable" state.
    #[error("Upstream unavailable (last strategy: {last_strategy}, last status: {last_status:?})")]
    UpstreamUnavailable {
        /// The last strategy attempted before giving up
        last_strategy: String,
        /// The last HTTP status observed, if any
        last_status: Option<u16>,
    },
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use coindeck_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "mobula".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::HardUpstream { provider: "mobula".to_string(), status: 500 };
    /// assert_eq!(error.retry_class(), RetryClass::NextStrategy);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transient errors - retry with backoff
            Self::RateLimited { .. } | Self::TransientNetwork { .. } => RetryClass::WithBackoff,

            // This strategy is broken, an alternate may succeed
            Self::HardUpstream { .. } | Self::MalformedPayload { .. } => RetryClass::NextStrategy,

            // Exhausted all options - terminal
            Self::UpstreamUnavailable { .. } => RetryClass::Never,
        }
    }

    /// The HTTP status associated with this error, if one was observed.
    ///
    /// Used to populate the `last_status` diagnostic of
    /// [`UpstreamUnavailable`](Self::UpstreamUnavailable).
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::HardUpstream { status, .. } => Some(*status),
            Self::UpstreamUnavailable { last_status, .. } => *last_status,
            Self::TransientNetwork { .. } | Self::MalformedPayload { .. } => None,
        }
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(err: reqwest::Error) -> Self {
        MarketDataError::TransientNetwork {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_retries_with_backoff() {
        let error = MarketDataError::RateLimited {
            provider: "mobula".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
        assert_eq!(error.status(), Some(429));
    }

    #[test]
    fn test_transient_network_retries_with_backoff() {
        let error = MarketDataError::TransientNetwork {
            message: "connection reset by peer".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_hard_upstream_tries_next_strategy() {
        let error = MarketDataError::HardUpstream {
            provider: "mobula".to_string(),
            status: 500,
        };
        assert_eq!(error.retry_class(), RetryClass::NextStrategy);
        assert_eq!(error.status(), Some(500));
    }

    #[test]
    fn test_malformed_payload_tries_next_strategy() {
        let error = MarketDataError::MalformedPayload {
            provider: "coingecko".to_string(),
            message: "missing data array".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextStrategy);
    }

    #[test]
    fn test_upstream_unavailable_never_retries() {
        let error = MarketDataError::UpstreamUnavailable {
            last_strategy: "mobula-volume".to_string(),
            last_status: Some(500),
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
        assert_eq!(error.status(), Some(500));
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::HardUpstream {
            provider: "mobula".to_string(),
            status: 503,
        };
        assert_eq!(
            format!("{}", error),
            "Upstream error: mobula returned HTTP 503"
        );

        let error = MarketDataError::RateLimited {
            provider: "coingecko".to_string(),
        };
        assert_eq!(format!("{}", error), "Rate limited: coingecko");
    }
}
