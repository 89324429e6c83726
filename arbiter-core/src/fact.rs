//! Normalized outcome facts
//!
//! The outcome pipeline reduces every provider payload to a flat list of
//! `NormalizedFact`s. The `canonical_key` is the grouping handle: facts that
//! assert the same thing about the same match share a key, whatever provider
//! they came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Status markers that mean a match has finished.
const FINAL_STATUS_MARKERS: [&str; 9] = [
    "ft",
    "fulltime",
    "finished",
    "final",
    "completed",
    "after overtime",
    "aet",
    "ended",
    "finale",
];

/// What kind of assertion a fact makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    Result,
    Scoreline,
    Award,
    News,
    Other,
}

/// One normalized assertion from one provider about one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedFact {
    /// Stable fingerprint for dedup inside the evidence payload.
    pub id: String,
    pub provider: String,
    pub canonical_key: String,
    /// Human-readable restatement of the fact.
    pub display: String,
    pub category: FactCategory,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub winner: Option<String>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub award: Option<String>,
    pub player: Option<String>,
    pub status: Option<String>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    /// Provider reliability in [0, 1], looked up from the provider table.
    pub reliability: f64,
    /// The raw provider row this fact was derived from.
    pub raw: serde_json::Value,
}

impl NormalizedFact {
    /// Whether this fact reports a concluded match. News headlines are only
    /// written after the fact, so `news` counts as final.
    pub fn is_final(&self) -> bool {
        if self.category == FactCategory::News {
            return true;
        }
        match &self.status {
            Some(status) => {
                let status = status.to_lowercase();
                FINAL_STATUS_MARKERS.iter().any(|m| status.contains(m))
            }
            None => false,
        }
    }

    /// Fingerprint a fact from the fields that identify it.
    pub fn fingerprint(provider: &str, canonical_key: &str, display: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update(canonical_key.as_bytes());
        hasher.update(display.as_bytes());
        let digest = hasher.finalize();
        format!("{:x}", digest)[..16].to_string()
    }
}
