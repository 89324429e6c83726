//! Retrying HTTP JSON fetcher
//!
//! Every provider request in the system goes through here: per-host circuit
//! breaker check, exponential-backoff retries, typed failure kinds. The
//! fetcher never panics across the boundary; callers get a
//! `Result<Value, ProviderError>` and decide what to record.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::breaker::{BreakerMap, BreakerPolicy, HostBreaker};
use crate::error::ProviderError;

/// Default transport timeout for provider calls.
pub const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(15);

/// Exponential backoff policy. Attempt `i` sleeps
/// `initial_delay * factor^i` before its retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub initial_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            initial_delay: Duration::from_millis(300),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay * self.factor.saturating_pow(attempt)
    }

    /// A policy that never retries (used by tests and the RSS source).
    pub fn none() -> Self {
        Self {
            retries: 0,
            initial_delay: Duration::from_millis(0),
            factor: 1,
        }
    }
}

/// Whether `DEBUG=true` verbose failure traces are requested.
fn debug_trace() -> bool {
    std::env::var("DEBUG")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// HTTP JSON fetcher with retry and per-host circuit breaking.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    breakers: BreakerMap,
}

impl Fetcher {
    /// Create a fetcher with default breaker policy and transport timeout.
    pub fn new() -> Self {
        Self::with_policy(BreakerPolicy::default())
    }

    /// Create a fetcher with a custom breaker policy.
    pub fn with_policy(policy: BreakerPolicy) -> Self {
        Self {
            client: Client::builder()
                .timeout(TRANSPORT_TIMEOUT)
                .user_agent("arbiter-resolution/0.1")
                .build()
                .unwrap_or_else(|_| Client::new()),
            breakers: BreakerMap::new(policy),
        }
    }

    /// The process-wide breaker map (shared by clones of this fetcher).
    pub fn breakers(&self) -> &BreakerMap {
        &self.breakers
    }

    /// Breaker cell for the host of `url`, if the URL parses.
    pub fn breaker_for(&self, url: &str) -> Option<std::sync::Arc<HostBreaker>> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        Some(self.breakers.for_host(host))
    }

    /// Fetch a URL and decode the body as JSON.
    ///
    /// Open breaker fails immediately with `CircuitOpen` and no request is
    /// issued. Any non-2xx status, transport error or decode error counts
    /// as a failure; after `retry.retries` retries the terminal failure is
    /// recorded against the host breaker. Success resets the breaker.
    pub async fn fetch_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        retry: &RetryPolicy,
    ) -> Result<Value, ProviderError> {
        let parsed = Url::parse(url).map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ProviderError::InvalidUrl(format!("no host in {}", url)))?
            .to_string();

        let breaker = self.breakers.for_host(&host);
        if breaker.is_open() {
            debug!("skipping {}: circuit open for {}", url, host);
            return Err(ProviderError::CircuitOpen { host });
        }

        let mut last_error = ProviderError::RequestFailed("no attempt made".into());
        for attempt in 0..=retry.retries {
            match self.attempt(url, headers).await {
                Ok(value) => {
                    breaker.record_success();
                    return Ok(value);
                }
                Err(e) => {
                    if debug_trace() {
                        warn!("fetch attempt {} failed for {}: {:?}", attempt + 1, url, e);
                    } else {
                        debug!("fetch attempt {} failed for {}: {}", attempt + 1, url, e);
                    }
                    last_error = e;
                }
            }
            if attempt < retry.retries {
                tokio::time::sleep(retry.delay_for(attempt)).await;
            }
        }

        warn!("fetch failed for {} after {} attempts: {}", url, retry.retries + 1, last_error);
        if last_error.counts_as_breaker_failure() {
            breaker.record_failure();
        }
        Err(last_error)
    }

    async fn attempt(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Value, ProviderError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_for(0), Duration::from_millis(300));
        assert_eq!(retry.delay_for(1), Duration::from_millis(600));
    }

    #[test]
    fn test_none_policy_does_not_retry() {
        let retry = RetryPolicy::none();
        assert_eq!(retry.retries, 0);
    }
}
