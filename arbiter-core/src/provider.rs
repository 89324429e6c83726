//! Provider envelopes and quality tiers

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dedicated statistics vendors; consensus requires at least one of these
/// to agree before a statistic is considered settled.
pub const STATS_PROVIDERS: [&str; 3] = ["OPTA_STATS", "STATSBOMB", "SPORTSRADAR"];

/// Provider quality band, 1 (official/industry) through 4
/// (aggregators/archives). The band sets the default advisory weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Official,
    Industry,
    Media,
    Aggregator,
}

impl Tier {
    /// Numeric rank, 1 = best.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Official => 1,
            Tier::Industry => 2,
            Tier::Media => 3,
            Tier::Aggregator => 4,
        }
    }

    /// Default advisory weight for confidence scoring. Never used for
    /// consensus selection.
    pub fn weight(&self) -> f64 {
        match self {
            Tier::Official => 0.45,
            Tier::Industry => 0.30,
            Tier::Media => 0.25,
            Tier::Aggregator => 0.15,
        }
    }
}

/// A successful provider fetch, payload left opaque for the normalizers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider: String,
    pub tier: Tier,
    pub weight: f64,
    pub collected_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

/// Typed join result of one fan-out task. Skips and failures are data, not
/// errors: the pipeline always reconciles whatever arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Success(ProviderResponse),
    Skipped { provider: String, reason: String },
    Failed { provider: String, error: String },
}

impl ProviderOutcome {
    /// Provider key regardless of outcome.
    pub fn provider(&self) -> &str {
        match self {
            ProviderOutcome::Success(resp) => &resp.provider,
            ProviderOutcome::Skipped { provider, .. } => provider,
            ProviderOutcome::Failed { provider, .. } => provider,
        }
    }

    pub fn as_success(&self) -> Option<&ProviderResponse> {
        match self {
            ProviderOutcome::Success(resp) => Some(resp),
            _ => None,
        }
    }
}
