//! Shared HTTP plumbing for the upstream clients.
//!
//! [`RetryingFetcher`] wraps a [`reqwest::Client`] with the retry policy
//! both providers share: rate limiting (HTTP 429) and transport failures
//! back off exponentially and retry in place, while any other non-success
//! status fails the request immediately so the caller can move on to its
//! next strategy.

use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode};

use crate::errors::{MarketDataError, RetryClass};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP GET with bounded exponential-backoff retries.
#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    client: Client,
    provider: &'static str,
    bearer: Option<String>,
    max_attempts: u32,
    initial_delay: Duration,
}

impl RetryingFetcher {
    /// Build a fetcher for `provider`.
    ///
    /// `max_attempts` is the total number of tries (clamped to at least 1);
    /// the delay before each retry starts at `initial_delay` and doubles.
    pub fn new(
        provider: &'static str,
        bearer: Option<String>,
        max_attempts: u32,
        initial_delay: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .unwrap_or_default();
        Self {
            client,
            provider,
            bearer,
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// GET `url` and return the response body.
    ///
    /// Retries on 429 and on transport errors, sleeping `initial_delay`,
    /// then twice that, and so on between attempts. Exhausted retries
    /// surface as [`MarketDataError::RateLimited`] or
    /// [`MarketDataError::TransientNetwork`]; any other non-2xx status is
    /// returned at once as [`MarketDataError::HardUpstream`].
    pub async fn get(&self, url: &str) -> Result<String, MarketDataError> {
        let mut delay = self.initial_delay;
        let mut last_error = MarketDataError::RateLimited {
            provider: self.provider.to_string(),
        };

        for attempt in 1..=self.max_attempts {
            match self.try_get(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.retry_class() == RetryClass::WithBackoff => {
                    warn!(
                        "{} request attempt {}/{} failed: {}",
                        self.provider, attempt, self.max_attempts, e
                    );
                    last_error = e;
                    if attempt < self.max_attempts {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    async fn try_get(&self, url: &str) -> Result<String, MarketDataError> {
        debug!("{} GET {}", self.provider, url);

        let mut request = self.client.get(url);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: self.provider.to_string(),
            });
        }
        if !status.is_success() {
            return Err(MarketDataError::HardUpstream {
                provider: self.provider.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(base: u64) -> RetryingFetcher {
        RetryingFetcher::new(
            "mobula",
            Some("test-key".to_string()),
            3,
            Duration::from_millis(base),
            None,
        )
    }

    #[tokio::test]
    async fn test_returns_body_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ok")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let body = fetcher(1).get(&format!("{}/ok", server.url())).await.unwrap();

        assert_eq!(body, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_retries_then_exhausts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/limited")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let err = fetcher(1)
            .get(&format!("{}/limited", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, MarketDataError::RateLimited { .. }));
        mock.assert_async().await; // all three attempts hit the server
    }

    #[tokio::test]
    async fn test_server_error_fails_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/broken")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let err = fetcher(1)
            .get(&format!("{}/broken", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MarketDataError::HardUpstream { status: 500, .. }
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transport_error_is_transient() {
        // Nothing listens on this port.
        let err = fetcher(1)
            .get("http://127.0.0.1:9/nope")
            .await
            .unwrap_err();

        assert!(matches!(err, MarketDataError::TransientNetwork { .. }));
    }
}
