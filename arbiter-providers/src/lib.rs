//! Provider fan-out machinery for the arbiter
//!
//! This crate owns everything that touches the network: the retrying JSON
//! fetcher with per-host circuit breakers, the declarative provider
//! registry, the sports RSS headline source, and the bounded-concurrency
//! fan-out driver that turns a classified query into a pile of
//! `ProviderOutcome` envelopes for the engine to reconcile.

pub mod breaker;
pub mod error;
pub mod fanout;
pub mod fetch;
pub mod registry;
pub mod rss;

pub use breaker::{BreakerMap, BreakerPolicy, HostBreaker};
pub use error::ProviderError;
pub use fanout::{fan_out, FanOutPlan, OUTCOME_CONCURRENCY, STATISTIC_CONCURRENCY};
pub use fetch::{Fetcher, RetryPolicy};
pub use registry::{outcome_providers, statistic_providers, AuthStyle, ProviderSpec, QueryParams};
pub use rss::{default_feeds, RssClient, SportsFeed};
