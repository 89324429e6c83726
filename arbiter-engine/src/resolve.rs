//! Resolution orchestrator
//!
//! Drives classify → fan-out → normalize → validate → consensus →
//! confidence → evidence for one inbound query. The reconciliation stages
//! are pure functions over collected provider envelopes; only the fan-out
//! and the advisory pass touch the network. A partial result is always
//! returned; upstream failures land in the evidence, never abort the
//! request.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use arbiter_core::{
    text::normalize_name, ClassifiedQuery, FactCategory, OutcomeQuery, PipelineKind,
    ProviderOutcome, QuestionType, ResolutionResult, StatisticEvidence, StatisticQuery,
    INSUFFICIENT_DATA, MAX_SOURCES,
};
use arbiter_providers::{
    fan_out, outcome_providers, statistic_providers, FanOutPlan, Fetcher, QueryParams, RssClient,
    OUTCOME_CONCURRENCY, STATISTIC_CONCURRENCY,
};

use crate::advisor::{merge_review, Advisor, AdvisorContext};
use crate::classify::classify;
use crate::confidence::{outcome_confidence, statistic_confidence};
use crate::consensus::{outcome_consensus, statistic_consensus, MIN_CORROBORATING_PROVIDERS};
use crate::evidence::EvidenceBuilder;
use crate::normalize::{normalize_outcome, normalize_statistics};
use crate::validate::validate;

/// Confidence attached to a query that classified but could not resolve.
const INSUFFICIENT_CONSENSUS_CONFIDENCE: f64 = 0.30;

/// Confidence attached to a query that did not classify at all.
const CLASSIFICATION_FAILURE_CONFIDENCE: f64 = 0.25;

/// The resolution engine.
pub struct Resolver {
    fetcher: Fetcher,
    rss: RssClient,
    advisor: Option<Advisor>,
    deadline: Option<std::time::Duration>,
}

impl Resolver {
    /// Build with defaults: fresh breaker map, configured RSS feeds, and
    /// the advisor enabled when `OPENAI_API_KEY` is set.
    pub fn new() -> Self {
        Self {
            fetcher: Fetcher::new(),
            rss: RssClient::new(),
            advisor: Advisor::from_env(),
            deadline: None,
        }
    }

    /// Per-request deadline propagated to every outstanding fetch.
    pub fn with_deadline(mut self, deadline: std::time::Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_rss_client(mut self, rss: RssClient) -> Self {
        self.rss = rss;
        self
    }

    pub fn with_advisor(mut self, advisor: Advisor) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn without_advisor(mut self) -> Self {
        self.advisor = None;
        self
    }

    /// Resolve one free-form query end to end.
    #[instrument(skip(self))]
    pub async fn resolve(&self, query: &str) -> ResolutionResult {
        let Some(classified) = classify(query) else {
            let mut builder = EvidenceBuilder::new(query);
            builder.error("ClassificationFailure: neither pipeline applies");
            let reasoning =
                "The query could not be classified as an outcome or statistic question."
                    .to_string();
            return insufficient(
                builder,
                CLASSIFICATION_FAILURE_CONFIDENCE,
                reasoning,
                Vec::new(),
            );
        };

        let mut result = match classified {
            ClassifiedQuery::Outcome(q) => {
                info!("outcome pipeline: {:?}", q.question_type);
                let outcomes = self.gather_outcome(&q).await;
                reconcile_outcome(&q, outcomes)
            }
            ClassifiedQuery::Statistic(q) => {
                info!("statistic pipeline: {:?}", q.statistic_type);
                let outcomes = self.gather_statistic(&q).await;
                reconcile_statistic(&q, outcomes)
            }
        };

        self.advise(query, &mut result).await;
        result
    }

    async fn gather_outcome(&self, query: &OutcomeQuery) -> Vec<ProviderOutcome> {
        let params = QueryParams {
            home_team: query.teams.first().cloned(),
            away_team: query.teams.get(1).cloned(),
            date: query.date.map(|d| d.to_string()),
            competition: query.competition.clone(),
            player: query.player.clone(),
            ..Default::default()
        };

        let mut outcomes = fan_out(
            &self.fetcher,
            FanOutPlan {
                specs: outcome_providers(),
                params,
                concurrency: OUTCOME_CONCURRENCY,
                deadline: self.deadline,
            },
        )
        .await;

        outcomes.extend(self.rss.fetch_headlines(OUTCOME_CONCURRENCY).await);
        outcomes
    }

    async fn gather_statistic(&self, query: &StatisticQuery) -> Vec<ProviderOutcome> {
        let match_info = query.entities.match_info.as_ref();
        let params = QueryParams {
            statistic: Some(query.statistic_type.as_str().to_string()),
            match_id: match_info.and_then(|m| m.id.clone()),
            home_team: match_info.and_then(|m| m.home.clone()),
            away_team: match_info.and_then(|m| m.away.clone()),
            date: match_info.and_then(|m| m.date.map(|d| d.to_string())),
            competition: match_info.and_then(|m| m.competition.clone()),
            team: query.entities.team.clone(),
            player: query.entities.player.clone(),
            period: Some(query.period.as_str().to_string()),
        };

        fan_out(
            &self.fetcher,
            FanOutPlan {
                specs: statistic_providers(),
                params,
                concurrency: STATISTIC_CONCURRENCY,
                deadline: self.deadline,
            },
        )
        .await
    }

    /// Advisory pass. Failures are silently dropped; mismatched resolutions
    /// are recorded by the merge and never applied.
    async fn advise(&self, query: &str, result: &mut ResolutionResult) {
        let Some(advisor) = &self.advisor else {
            return;
        };
        if result.resolution == INSUFFICIENT_DATA {
            return;
        }

        let context = AdvisorContext {
            query: query.to_string(),
            request: json!({"pipeline": result.evidence.metadata.pipeline}),
            accepted_group_key: result.evidence.data.accepted_group_key.clone(),
            resolution: result.resolution.clone(),
            confidence: result.confidence,
            providers: result.sources.clone(),
        };

        match advisor.review(&context).await {
            Ok((review, raw)) => merge_review(result, review, raw),
            Err(e) => {
                debug!("advisor pass failed, omitted: {}", e);
            }
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconcile collected envelopes for an outcome query.
pub fn reconcile_outcome(
    query: &OutcomeQuery,
    outcomes: Vec<ProviderOutcome>,
) -> ResolutionResult {
    let mut builder = EvidenceBuilder::new(&query.raw_text);
    builder.pipeline(PipelineKind::Outcome);
    builder.artifact("classified_request", json!(query));
    builder.record_outcomes(&outcomes);

    let mut facts = Vec::new();
    for outcome in &outcomes {
        if let Some(response) = outcome.as_success() {
            facts.extend(normalize_outcome(response, query));
        }
    }
    builder.artifact("normalization", json!({ "facts": facts.len() }));

    let consensus = outcome_consensus(&facts);
    builder.facts(facts.clone());
    builder.groups(consensus.groups.clone());
    builder.accepted_group_key(consensus.accepted_group().map(|g| g.key.clone()));
    builder.artifact(
        "group_table",
        json!(consensus
            .groups
            .iter()
            .map(|g| json!({"key": g.key, "providers": g.providers.len()}))
            .collect::<Vec<_>>()),
    );

    let Some(group) = consensus.accepted_group() else {
        builder.error("InsufficientConsensus: no groupable facts");
        let reasoning = "No provider produced a groupable fact for this query.".to_string();
        return insufficient(
            builder,
            INSUFFICIENT_CONSENSUS_CONFIDENCE,
            reasoning,
            Vec::new(),
        );
    };

    let sources: Vec<String> = group.providers.iter().cloned().collect();

    if !consensus.corroborated() {
        builder.error(format!(
            "InsufficientConsensus: accepted group has {} distinct providers, {} required",
            group.providers.len(),
            MIN_CORROBORATING_PROVIDERS
        ));
        let reasoning = format!(
            "Only {} distinct provider(s) corroborate the leading answer; {} are required.",
            group.providers.len(),
            MIN_CORROBORATING_PROVIDERS
        );
        return insufficient(builder, INSUFFICIENT_CONSENSUS_CONFIDENCE, reasoning, sources);
    }

    let winner = group.facts.iter().find_map(|f| f.winner.clone());
    let resolution = derive_outcome_resolution(query, &consensus, winner.as_deref());

    let Some(resolution) = resolution else {
        builder.error("InsufficientConsensus: accepted group carries no winner or award");
        let reasoning =
            "The corroborated facts carry neither a winner nor an award for this question."
                .to_string();
        return insufficient(builder, INSUFFICIENT_CONSENSUS_CONFIDENCE, reasoning, sources);
    };

    let breakdown = outcome_confidence(&consensus, Utc::now());
    builder.artifact("confidence_breakdown", json!(breakdown));

    let reasoning = format!(
        "{} distinct providers corroborate group '{}' with {} conflicting group(s); resolved '{}'.",
        group.providers.len(),
        group.key,
        consensus.conflicts,
        resolution
    );
    builder.agent_summary(&reasoning);

    ResolutionResult {
        resolution,
        confidence: breakdown.score,
        reasoning,
        sources: cap_sources(sources),
        evidence: builder.finish(),
    }
}

fn derive_outcome_resolution(
    query: &OutcomeQuery,
    consensus: &crate::consensus::OutcomeConsensus,
    winner: Option<&str>,
) -> Option<String> {
    let group = consensus.accepted_group()?;

    match query.question_type {
        QuestionType::WhoWon => winner.map(str::to_string),
        QuestionType::DidResultHappen => {
            let winner = winner?;
            let subject = query.teams.first()?;
            Some(if normalize_name(winner) == normalize_name(subject) {
                "yes".to_string()
            } else {
                "no".to_string()
            })
        }
        QuestionType::Scoreline => group
            .facts
            .iter()
            .find(|f| f.home_score.is_some() && f.away_score.is_some())
            .and_then(|f| {
                let home = f.home_team.as_deref()?;
                let away = f.away_team.as_deref()?;
                Some(format!(
                    "{} {}-{} {}",
                    home,
                    f.home_score?,
                    f.away_score?,
                    away
                ))
            }),
        QuestionType::PlayerAward => group
            .facts
            .iter()
            .find(|f| f.category == FactCategory::Award)
            .and_then(|f| f.player.clone()),
        QuestionType::Other => winner.map(str::to_string),
    }
}

/// Reconcile collected envelopes for a statistic query.
pub fn reconcile_statistic(
    query: &StatisticQuery,
    outcomes: Vec<ProviderOutcome>,
) -> ResolutionResult {
    let mut builder = EvidenceBuilder::new(&query.raw_text);
    builder.pipeline(PipelineKind::Statistic);
    builder.artifact("classified_request", json!(query));

    // Resolvability gate: a known event end that is too recent cannot be
    // settled yet. An unknown end time is attempted anyway.
    if query.event_end_time.is_some() && !query.can_resolve_now {
        builder.warning("event ended less than 15 minutes ago; not yet resolvable");
        let reasoning =
            "The event finished too recently for providers to have settled statistics."
                .to_string();
        return insufficient(
            builder,
            INSUFFICIENT_CONSENSUS_CONFIDENCE,
            reasoning,
            Vec::new(),
        );
    }

    builder.record_outcomes(&outcomes);

    let provider_failures: Vec<String> = outcomes
        .iter()
        .filter_map(|o| match o {
            ProviderOutcome::Failed { provider, error } => {
                Some(format!("{}: {}", provider, error))
            }
            _ => None,
        })
        .collect();
    let providers: Vec<String> = outcomes
        .iter()
        .filter_map(|o| o.as_success().map(|r| r.provider.clone()))
        .collect();

    let mut statistics = Vec::new();
    for outcome in &outcomes {
        if let Some(response) = outcome.as_success() {
            statistics.extend(normalize_statistics(response, query));
        }
    }
    builder.artifact("normalization", json!({ "statistics": statistics.len() }));

    let validation = validate(&statistics);
    for warning in &validation.warnings {
        builder.warning(warning.clone());
    }

    let consensus = statistic_consensus(&statistics, query);
    builder.artifact("consensus", json!(consensus));

    let breakdown = statistic_confidence(&consensus, &validation, &statistics, Utc::now());
    builder.artifact("confidence_breakdown", json!(breakdown));

    let sources = cap_sources(consensus.supporting_sources.clone());
    builder.statistics(StatisticEvidence {
        providers,
        normalized_statistics: statistics.clone(),
        validation: validation.clone(),
        consensus: consensus.clone(),
        confidence: breakdown.clone(),
        errors: provider_failures,
        warnings: validation.warnings.clone(),
    });

    if !consensus.agreed {
        builder.error(format!(
            "InsufficientConsensus: agreement_count={} stats_providers={} variance={:.3}",
            consensus.agreement_count, consensus.stats_provider_count, consensus.variance
        ));
        let reasoning = format!(
            "Providers did not reach consensus on {} ({} agreeing observation(s)).",
            query.statistic_type.as_str(),
            consensus.agreement_count
        );
        return insufficient(builder, INSUFFICIENT_CONSENSUS_CONFIDENCE, reasoning, sources);
    }

    let Some(agreed_value) = consensus.agreed_value else {
        // agreed implies a value; reaching here is a programming error.
        warn!("consensus agreed without a value");
        builder.error("Internal: consensus agreed without a value");
        return insufficient(
            builder,
            INSUFFICIENT_CONSENSUS_CONFIDENCE,
            "Internal consensus inconsistency.".to_string(),
            sources,
        );
    };

    let resolution = match (query.threshold, query.comparator) {
        (Some(threshold), Some(comparator)) => {
            if comparator.evaluate(agreed_value, threshold) {
                "yes".to_string()
            } else {
                "no".to_string()
            }
        }
        _ => format!(
            "{}:{}{}",
            query.statistic_type.as_str(),
            format_value(agreed_value),
            consensus.unit.suffix()
        ),
    };

    let reasoning = match (query.threshold, query.comparator) {
        (Some(threshold), Some(comparator)) => format!(
            "Consensus value {} for {} ({} agreeing observations); threshold {} {} evaluates '{}'.",
            format_value(agreed_value),
            query.statistic_type.as_str(),
            consensus.agreement_count,
            comparator.symbol(),
            format_value(threshold),
            resolution
        ),
        _ => format!(
            "Consensus value {} for {} from {} agreeing observations (variance {:.3}).",
            format_value(agreed_value),
            query.statistic_type.as_str(),
            consensus.agreement_count,
            consensus.variance
        ),
    };
    builder.agent_summary(&reasoning);

    ResolutionResult {
        resolution,
        confidence: breakdown.score,
        reasoning,
        sources,
        evidence: builder.finish(),
    }
}

fn insufficient(
    mut builder: EvidenceBuilder,
    confidence: f64,
    reasoning: String,
    sources: Vec<String>,
) -> ResolutionResult {
    builder.agent_summary(&reasoning);
    ResolutionResult {
        resolution: INSUFFICIENT_DATA.to_string(),
        confidence,
        reasoning,
        sources: cap_sources(sources),
        evidence: builder.finish(),
    }
}

/// Unique sources, capped at [`MAX_SOURCES`].
fn cap_sources(mut sources: Vec<String>) -> Vec<String> {
    sources.sort();
    sources.dedup();
    sources.truncate(MAX_SOURCES);
    sources
}

/// Integer-valued floats render without a fraction.
fn format_value(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(4.0), "4");
        assert_eq!(format_value(2.5), "2.5");
    }

    #[test]
    fn test_cap_sources_unique_and_bounded() {
        let sources: Vec<String> = (0..12)
            .map(|i| format!("s{}", i % 6))
            .collect();
        let capped = cap_sources(sources);
        assert_eq!(capped.len(), 6);

        let many: Vec<String> = (0..12).map(|i| format!("s{:02}", i)).collect();
        assert_eq!(cap_sources(many).len(), MAX_SOURCES);
    }
}
