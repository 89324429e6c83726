//! Sports RSS headline source
//!
//! Tier-3 textual evidence: feed titles like "Lakers edge Suns in overtime"
//! corroborate structured providers but can never resolve a query on their
//! own (the reliability cap and the corroboration rule see to that).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use arbiter_core::{text::normalize_name, ProviderOutcome, ProviderResponse, Tier};

/// Env var holding a comma-separated list of feed URLs that replaces the
/// built-in table.
pub const FEEDS_ENV: &str = "SPORTS_RSS_FEEDS";

/// One RSS feed definition.
#[derive(Debug, Clone)]
pub struct SportsFeed {
    /// Short source name; the provider id becomes `rss:<normalized name>`.
    pub name: String,
    pub url: String,
}

impl SportsFeed {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    /// Provider id used in evidence and consensus accounting.
    pub fn provider_id(&self) -> String {
        format!("rss:{}", normalize_name(&self.name))
    }
}

/// Curated sports feeds used when `SPORTS_RSS_FEEDS` is unset.
pub fn default_feeds() -> Vec<SportsFeed> {
    vec![
        SportsFeed::new("ESPN", "https://www.espn.com/espn/rss/news"),
        SportsFeed::new("ESPN NBA", "https://www.espn.com/espn/rss/nba/news"),
        SportsFeed::new("ESPN Soccer", "https://www.espn.com/espn/rss/soccer/news"),
        SportsFeed::new("BBC Sport", "https://feeds.bbci.co.uk/sport/rss.xml"),
        SportsFeed::new(
            "BBC Football",
            "https://feeds.bbci.co.uk/sport/football/rss.xml",
        ),
        SportsFeed::new("CBS Sports", "https://www.cbssports.com/rss/headlines/"),
        SportsFeed::new(
            "Guardian Sport",
            "https://www.theguardian.com/uk/sport/rss",
        ),
    ]
}

/// Feed table honoring the env override. Overridden feeds are named after
/// their host, so two feeds from one host share a provider id.
pub fn configured_feeds() -> Vec<SportsFeed> {
    match std::env::var(FEEDS_ENV) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|url| {
                let name = reqwest::Url::parse(url)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h.to_string()))
                    .unwrap_or_else(|| "feed".to_string());
                SportsFeed::new(&name, url)
            })
            .collect(),
        _ => default_feeds(),
    }
}

/// RSS feed client
#[derive(Debug, Clone)]
pub struct RssClient {
    client: Client,
    feeds: Vec<SportsFeed>,
}

impl RssClient {
    /// Create a client over the configured feed table.
    pub fn new() -> Self {
        Self::with_feeds(configured_feeds())
    }

    pub fn with_feeds(feeds: Vec<SportsFeed>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("arbiter-resolution/0.1")
                .build()
                .unwrap_or_else(|_| Client::new()),
            feeds,
        }
    }

    /// Fetch headlines from every feed, at most `concurrency` in flight.
    /// Each feed becomes its own provider envelope so corroboration counts
    /// feeds, not the RSS source as a whole.
    pub async fn fetch_headlines(&self, concurrency: usize) -> Vec<ProviderOutcome> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let fetches = self.feeds.iter().map(|feed| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                self.fetch_feed(feed).await
            }
        });

        let outcomes = futures::future::join_all(fetches).await;
        let ok = outcomes
            .iter()
            .filter(|o| matches!(o, ProviderOutcome::Success(_)))
            .count();
        info!("rss fan-out: {}/{} feeds fetched", ok, outcomes.len());
        outcomes
    }

    async fn fetch_feed(&self, feed: &SportsFeed) -> ProviderOutcome {
        let provider = feed.provider_id();

        let response = match self.client.get(&feed.url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("rss feed {} failed: {}", feed.name, e);
                return ProviderOutcome::Failed {
                    provider,
                    error: format!("request failed: {}", e),
                };
            }
        };

        if !response.status().is_success() {
            return ProviderOutcome::Failed {
                provider,
                error: format!("http status {}", response.status().as_u16()),
            };
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                return ProviderOutcome::Failed {
                    provider,
                    error: format!("body read failed: {}", e),
                }
            }
        };

        let channel = match rss::Channel::read_from(&body[..]) {
            Ok(c) => c,
            Err(e) => {
                return ProviderOutcome::Failed {
                    provider,
                    error: format!("feed parse failed: {}", e),
                }
            }
        };

        // Dedup within the feed by normalized title.
        let mut seen = HashSet::new();
        let items: Vec<serde_json::Value> = channel
            .items()
            .iter()
            .filter_map(|item| {
                let title = item.title()?.trim().to_string();
                if title.is_empty() || !seen.insert(normalize_name(&title)) {
                    return None;
                }
                Some(json!({
                    "title": title,
                    "link": item.link(),
                    "published": item.pub_date(),
                }))
            })
            .collect();

        ProviderOutcome::Success(ProviderResponse {
            provider,
            tier: Tier::Media,
            weight: Tier::Media.weight(),
            collected_at: Utc::now(),
            payload: json!({ "source": feed.name, "items": items }),
            meta: [("feed_url".to_string(), feed.url.clone())].into(),
        })
    }
}

impl Default for RssClient {
    fn default() -> Self {
        Self::new()
    }
}
