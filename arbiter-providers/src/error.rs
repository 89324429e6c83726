//! Error types for provider fetching

use thiserror::Error;

/// Errors that can occur while fetching from a provider.
///
/// These are kinds, not control flow: the fan-out layer converts every one
/// of them into a `ProviderOutcome::Failed` or `Skipped` envelope and the
/// pipeline keeps going.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Provider answered with a non-2xx status
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Body excerpt or status text
        message: String,
    },

    /// Response body was not the JSON we expected
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The host's circuit breaker is open; no request was issued
    #[error("Circuit open for host: {host}")]
    CircuitOpen { host: String },

    /// Transport timeout elapsed
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Provider has no base URL configured; skipped, not failed
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// URL could not be parsed at all
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ProviderError {
    /// Whether this error should count against the host's circuit breaker.
    /// Open-circuit short-circuits and configuration gaps never do; no
    /// request was issued for either.
    pub fn counts_as_breaker_failure(&self) -> bool {
        !matches!(
            self,
            ProviderError::CircuitOpen { .. }
                | ProviderError::NotConfigured(_)
                | ProviderError::InvalidUrl(_)
        )
    }
}
