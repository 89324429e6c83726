//! Deterministic resolution pipeline for sports outcome and statistic
//! queries
//!
//! Free-form question text goes in; a resolution with calibrated confidence
//! and a replayable evidence trail comes out. The pipeline is classify →
//! provider fan-out → normalize → validate → consensus → confidence →
//! evidence, with an optional LLM advisory pass that can polish the
//! reasoning but never change the answer.

pub mod advisor;
pub mod classify;
pub mod confidence;
pub mod consensus;
pub mod evidence;
pub mod normalize;
pub mod resolve;
pub mod synonyms;
pub mod validate;

pub use advisor::{extract_json, merge_review, Advisor, AdvisorContext, AdvisorReview};
pub use classify::classify;
pub use confidence::{outcome_confidence, statistic_confidence};
pub use consensus::{
    group_facts, outcome_consensus, statistic_consensus, OutcomeConsensus,
    MIN_CORROBORATING_PROVIDERS, MIN_STATISTIC_AGREEMENT,
};
pub use evidence::EvidenceBuilder;
pub use normalize::{normalize_outcome, normalize_statistics, provider_reliability};
pub use resolve::{reconcile_outcome, reconcile_statistic, Resolver};
pub use validate::{range_rule, validate, RangeRule};
