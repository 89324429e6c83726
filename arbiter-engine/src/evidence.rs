//! Evidence assembly
//!
//! Collects every intermediate artifact the pipeline produces into the
//! stable payload shape audit storage expects. Provider skips become
//! warnings, provider failures become errors; nothing is dropped.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use arbiter_core::{
    EvidenceArtifact, EvidenceData, EvidenceGroup, EvidenceMetadata, EvidencePayload,
    NormalizedFact, PipelineKind, ProviderOutcome, StatisticEvidence,
};

/// Incremental builder for one request's evidence payload.
#[derive(Debug)]
pub struct EvidenceBuilder {
    metadata: EvidenceMetadata,
    data: EvidenceData,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl EvidenceBuilder {
    pub fn new(query: &str) -> Self {
        Self {
            metadata: EvidenceMetadata {
                request_id: Uuid::new_v4().to_string(),
                query: query.to_string(),
                pipeline: PipelineKind::Unresolved,
                started_at: Utc::now(),
                finished_at: Utc::now(),
            },
            data: EvidenceData::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn pipeline(&mut self, pipeline: PipelineKind) {
        self.metadata.pipeline = pipeline;
    }

    pub fn artifact(&mut self, stage: &str, detail: serde_json::Value) {
        self.data
            .agent_artifacts
            .push(EvidenceArtifact::new(stage, detail));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Record the fan-out envelopes: skips are warnings, failures are
    /// errors keyed by kind, and the batch is summarized as an artifact.
    pub fn record_outcomes(&mut self, outcomes: &[ProviderOutcome]) {
        let mut summary = Vec::new();
        for outcome in outcomes {
            match outcome {
                ProviderOutcome::Success(resp) => {
                    summary.push(json!({"provider": resp.provider, "status": "success"}));
                }
                ProviderOutcome::Skipped { provider, reason } => {
                    self.warnings
                        .push(format!("ProviderSkipped: {}: {}", provider, reason));
                    summary.push(json!({"provider": provider, "status": "skipped"}));
                }
                ProviderOutcome::Failed { provider, error } => {
                    let kind = if error.contains("Circuit open") {
                        "CircuitOpen"
                    } else {
                        "ProviderFailure"
                    };
                    self.errors.push(format!("{}: {}: {}", kind, provider, error));
                    summary.push(json!({"provider": provider, "status": "failed"}));
                }
            }
        }
        self.artifact("provider_fan_out", json!(summary));
    }

    pub fn facts(&mut self, facts: Vec<NormalizedFact>) {
        self.data.normalized_facts = facts;
    }

    pub fn groups(&mut self, groups: Vec<EvidenceGroup>) {
        self.data.groups = groups;
    }

    pub fn accepted_group_key(&mut self, key: Option<String>) {
        self.data.accepted_group_key = key;
    }

    pub fn statistics(&mut self, statistics: StatisticEvidence) {
        self.data.statistics = Some(statistics);
    }

    pub fn agent_summary(&mut self, summary: impl Into<String>) {
        self.data.agent_summary = Some(summary.into());
    }

    pub fn finish(mut self) -> EvidencePayload {
        self.metadata.finished_at = Utc::now();
        EvidencePayload {
            metadata: self.metadata,
            data: self.data,
            errors: self.errors,
            warnings: self.warnings,
            model_output_raw: None,
        }
    }
}
