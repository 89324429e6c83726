//! Core types for the sports resolution arbiter
//!
//! This crate defines the shared data structures used across the arbiter,
//! including classified queries, normalized facts and statistics, provider
//! envelopes, and the evidence payload stored for audit.

pub mod error;
pub mod evidence;
pub mod fact;
pub mod provider;
pub mod query;
pub mod statistic;
pub mod text;

pub use error::{ArbiterError, ArbiterResult};
pub use evidence::{
    ConfidenceAdjustment, ConfidenceBreakdown, EvidenceArtifact, EvidenceData, EvidenceGroup,
    EvidenceMetadata, EvidencePayload, Outlier, PipelineKind, ResolutionResult,
    StatisticConsensus, StatisticEvidence, ValidationReport, INSUFFICIENT_DATA, MAX_SOURCES,
};
pub use fact::{FactCategory, NormalizedFact};
pub use provider::{ProviderOutcome, ProviderResponse, Tier, STATS_PROVIDERS};
pub use query::{
    ClassifiedQuery, Comparator, MatchEntities, OutcomeQuery, QueryEntities, QuestionType, Sport,
    StatisticQuery, StatisticQueryType,
};
pub use statistic::{Aggregation, NormalizedStatistic, Period, StatisticSource, StatisticType, Unit};
