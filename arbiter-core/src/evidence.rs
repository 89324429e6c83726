//! Resolution results and the audit evidence payload
//!
//! The evidence payload is the stable contract with audit storage: a
//! resolution must be reproducible from it alone. Every intermediate
//! artifact the pipeline produced is packaged here.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fact::NormalizedFact;
use crate::statistic::{NormalizedStatistic, StatisticType, Unit};

/// Resolution string returned whenever the evidence does not support an
/// answer. The system never guesses.
pub const INSUFFICIENT_DATA: &str = "insufficient_data";

/// Maximum number of sources attached to a resolution.
pub const MAX_SOURCES: usize = 8;

/// The answer to one inbound query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub resolution: String,
    /// Calibrated confidence in [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    /// Distinct supporting source ids, capped at [`MAX_SOURCES`].
    pub sources: Vec<String>,
    pub evidence: EvidencePayload,
}

/// Which pipeline produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Outcome,
    Statistic,
    Unresolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceMetadata {
    pub request_id: String,
    pub query: String,
    pub pipeline: PipelineKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One intermediate artifact, tagged with the stage that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    pub stage: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl EvidenceArtifact {
    pub fn new(stage: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            stage: stage.into(),
            detail,
            created_at: Utc::now(),
        }
    }
}

/// A set of facts that assert the same thing (same `canonical_key`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceGroup {
    pub key: String,
    pub facts: Vec<NormalizedFact>,
    /// Distinct provider ids contributing to this group.
    pub providers: BTreeSet<String>,
    pub reliability_average: f64,
}

/// A statistic value observed outside the agreement tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outlier {
    pub source: String,
    pub value: f64,
}

/// Verdict of the statistic consensus scan.
///
/// Invariant: `agreed` implies `agreement_count >= 3`,
/// `stats_provider_count >= 1` and `variance <= unit tolerance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticConsensus {
    pub statistic_type: StatisticType,
    pub agreed: bool,
    pub agreed_value: Option<f64>,
    pub unit: Unit,
    pub agreement_count: usize,
    pub variance: f64,
    pub outliers: Vec<Outlier>,
    pub tier1_count: usize,
    pub stats_provider_count: usize,
    pub official_source_present: bool,
    pub betting_market_alignment: bool,
    pub supporting_sources: Vec<String>,
}

/// Range and logical-rule validation output.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    pub within_range: bool,
    pub logically_consistent: bool,
    pub warnings: Vec<String>,
    pub invalid_sources: Vec<String>,
}

/// One applied confidence adjustment, recorded for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceAdjustment {
    pub factor: String,
    /// Additive delta or multiplicative factor depending on `multiplicative`.
    pub amount: f64,
    pub multiplicative: bool,
    pub reason: String,
}

/// Final confidence with the full adjustment trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub score: f64,
    pub adjustments: Vec<ConfidenceAdjustment>,
}

/// Statistic-pipeline evidence block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticEvidence {
    pub providers: Vec<String>,
    pub normalized_statistics: Vec<NormalizedStatistic>,
    pub validation: ValidationReport,
    pub consensus: StatisticConsensus,
    pub confidence: ConfidenceBreakdown,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvidenceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_summary: Option<String>,
    pub agent_artifacts: Vec<EvidenceArtifact>,
    pub normalized_facts: Vec<NormalizedFact>,
    pub groups: Vec<EvidenceGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_group_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<StatisticEvidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_summary: Option<String>,
}

/// Everything audit storage needs to replay a resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePayload {
    pub metadata: EvidenceMetadata,
    pub data: EvidenceData,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_output_raw: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_payload_round_trips() {
        let payload = EvidencePayload {
            metadata: EvidenceMetadata {
                request_id: "req-1".into(),
                query: "who won".into(),
                pipeline: PipelineKind::Outcome,
                started_at: Utc::now(),
                finished_at: Utc::now(),
            },
            data: EvidenceData::default(),
            errors: vec!["ProviderFailure: THESPORTSDB http 500".into()],
            warnings: vec![],
            model_output_raw: None,
        };

        let json = serde_json::to_string(&payload).unwrap();
        let back: EvidencePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metadata.request_id, "req-1");
        assert_eq!(back.errors.len(), 1);
        assert!(back.data.statistics.is_none());
    }
}
