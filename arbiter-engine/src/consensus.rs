//! Consensus selection
//!
//! Outcome path: group facts by canonical key, pick the group with the most
//! distinct providers (reliability average breaks ties) and require three
//! corroborating providers before anything resolves. Statistic path: pick
//! the value with the most peers inside the unit tolerance and gate
//! agreement on corroboration, a stats provider and low variance.
//!
//! Both selections are order-independent: permuting the input facts or
//! observations yields the same verdict.

use std::collections::BTreeMap;

use arbiter_core::{
    text::names_match, EvidenceGroup, NormalizedFact, NormalizedStatistic, Outlier,
    StatisticConsensus, StatisticQuery, Tier, STATS_PROVIDERS,
};

/// Distinct providers required in the accepted group before any non-null
/// resolution is derived.
pub const MIN_CORROBORATING_PROVIDERS: usize = 3;

/// Agreeing observations required for a statistic consensus.
pub const MIN_STATISTIC_AGREEMENT: usize = 3;

/// Outcome-path consensus verdict.
#[derive(Debug, Clone)]
pub struct OutcomeConsensus {
    /// All groups, best first (deterministic order).
    pub groups: Vec<EvidenceGroup>,
    /// Index of the accepted group in `groups`, when any facts exist.
    pub accepted: Option<usize>,
    /// Non-accepted groups with at least one provider.
    pub conflicts: usize,
}

impl OutcomeConsensus {
    pub fn accepted_group(&self) -> Option<&EvidenceGroup> {
        self.accepted.map(|i| &self.groups[i])
    }

    /// Whether the accepted group meets the corroboration floor.
    pub fn corroborated(&self) -> bool {
        self.accepted_group()
            .map(|g| g.providers.len() >= MIN_CORROBORATING_PROVIDERS)
            .unwrap_or(false)
    }
}

/// Group facts by canonical key. Sorted by provider count, then reliability
/// average, then key, so permuting the input changes nothing.
pub fn group_facts(facts: &[NormalizedFact]) -> Vec<EvidenceGroup> {
    let mut by_key: BTreeMap<&str, Vec<&NormalizedFact>> = BTreeMap::new();
    for fact in facts {
        by_key.entry(fact.canonical_key.as_str()).or_default().push(fact);
    }

    let mut groups: Vec<EvidenceGroup> = by_key
        .into_iter()
        .map(|(key, members)| {
            let providers = members.iter().map(|f| f.provider.clone()).collect();
            let reliability_average =
                members.iter().map(|f| f.reliability).sum::<f64>() / members.len() as f64;
            EvidenceGroup {
                key: key.to_string(),
                facts: members.into_iter().cloned().collect(),
                providers,
                reliability_average,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.providers
            .len()
            .cmp(&a.providers.len())
            .then_with(|| {
                b.reliability_average
                    .partial_cmp(&a.reliability_average)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.key.cmp(&b.key))
    });
    groups
}

/// Select the consensus group for the outcome path.
///
/// If the accepted group contains any "final" facts (finished status or
/// news category), the group is restricted to them before the orchestrator
/// reads a winner out of it.
pub fn outcome_consensus(facts: &[NormalizedFact]) -> OutcomeConsensus {
    let mut groups = group_facts(facts);

    let accepted = if groups.is_empty() { None } else { Some(0) };
    if let Some(idx) = accepted {
        let group = &mut groups[idx];
        let finals: Vec<NormalizedFact> = group
            .facts
            .iter()
            .filter(|f| f.is_final())
            .cloned()
            .collect();
        if !finals.is_empty() {
            group.facts = finals;
        }
    }

    let conflicts = match accepted {
        Some(idx) => groups
            .iter()
            .enumerate()
            .filter(|(i, g)| *i != idx && !g.providers.is_empty())
            .count(),
        None => 0,
    };

    OutcomeConsensus {
        groups,
        accepted,
        conflicts,
    }
}

/// One flattened observation used by the statistic scan.
#[derive(Debug, Clone)]
struct Observation {
    source: String,
    tier: Tier,
    value: f64,
}

/// Statistic consensus: peers-within-tolerance scan over the filtered
/// observations.
pub fn statistic_consensus(
    statistics: &[NormalizedStatistic],
    query: &StatisticQuery,
) -> StatisticConsensus {
    let unit = query.statistic_type.unit();
    let tolerance = unit.tolerance();

    let observations: Vec<Observation> = statistics
        .iter()
        .filter(|s| s.statistic_type == query.statistic_type)
        .filter(|s| entity_match(s, query))
        .flat_map(|s| {
            s.sources.iter().map(|src| Observation {
                source: src.source.clone(),
                tier: src.tier,
                value: src.parsed_value,
            })
        })
        .collect();

    if observations.is_empty() {
        return StatisticConsensus {
            statistic_type: query.statistic_type,
            agreed: false,
            agreed_value: None,
            unit,
            agreement_count: 0,
            variance: 0.0,
            outliers: Vec::new(),
            tier1_count: 0,
            stats_provider_count: 0,
            official_source_present: false,
            betting_market_alignment: false,
            supporting_sources: Vec::new(),
        };
    }

    // Best value: most peers strictly inside the tolerance; ties go to the
    // smaller value.
    let mut best_value = observations[0].value;
    let mut best_count = 0usize;
    for candidate in &observations {
        let count = observations
            .iter()
            .filter(|o| (o.value - candidate.value).abs() < tolerance)
            .count();
        if count > best_count || (count == best_count && candidate.value < best_value) {
            best_count = count;
            best_value = candidate.value;
        }
    }

    let mean = observations.iter().map(|o| o.value).sum::<f64>() / observations.len() as f64;
    let variance = observations
        .iter()
        .map(|o| (o.value - mean).powi(2))
        .sum::<f64>()
        / observations.len() as f64;

    let supporting: Vec<&Observation> = observations
        .iter()
        .filter(|o| (o.value - best_value).abs() < tolerance)
        .collect();
    let outliers: Vec<Outlier> = observations
        .iter()
        .filter(|o| (o.value - best_value).abs() >= tolerance)
        .map(|o| Outlier {
            source: o.source.clone(),
            value: o.value,
        })
        .collect();

    let mut supporting_sources: Vec<String> =
        supporting.iter().map(|o| o.source.clone()).collect();
    supporting_sources.sort();
    supporting_sources.dedup();

    let tier1_count = supporting.iter().filter(|o| o.tier == Tier::Official).count();
    let stats_provider_count = supporting
        .iter()
        .filter(|o| STATS_PROVIDERS.contains(&o.source.as_str()))
        .count();
    let official_source_present = supporting
        .iter()
        .any(|o| o.tier == Tier::Official || o.source.starts_with("OFFICIAL"));
    let betting_market_alignment = supporting.iter().any(|o| o.source == "THE_ODDS_API");

    let agreed = best_count >= MIN_STATISTIC_AGREEMENT
        && stats_provider_count >= 1
        && variance <= tolerance;

    StatisticConsensus {
        statistic_type: query.statistic_type,
        agreed,
        agreed_value: agreed.then_some(best_value),
        unit,
        agreement_count: best_count,
        variance,
        outliers,
        tier1_count,
        stats_provider_count,
        official_source_present,
        betting_market_alignment,
        supporting_sources,
    }
}

/// Entity filter: a statistic is kept unless it names a different team or
/// player than the query asked about.
fn entity_match(statistic: &NormalizedStatistic, query: &StatisticQuery) -> bool {
    if let (Some(want), Some(have)) = (&query.entities.team, &statistic.team) {
        if !names_match(want, have) {
            return false;
        }
    }
    if let (Some(want), Some(have)) = (&query.entities.player, &statistic.player) {
        if !names_match(want, have) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{
        Aggregation, FactCategory, Period, QueryEntities, StatisticQueryType, StatisticSource,
        StatisticType,
    };
    use chrono::Utc;
    use serde_json::Value;

    fn fact(provider: &str, key: &str, reliability: f64, status: Option<&str>) -> NormalizedFact {
        NormalizedFact {
            id: NormalizedFact::fingerprint(provider, key, "d"),
            provider: provider.into(),
            canonical_key: key.into(),
            display: "d".into(),
            category: FactCategory::Result,
            home_team: None,
            away_team: None,
            winner: Some("Lakers".into()),
            home_score: None,
            away_score: None,
            award: None,
            player: None,
            status: status.map(String::from),
            end_timestamp: None,
            source_url: None,
            reliability,
            raw: Value::Null,
        }
    }

    fn observation(source: &str, tier: Tier, value: f64) -> NormalizedStatistic {
        NormalizedStatistic {
            statistic_type: StatisticType::YellowCards,
            team: None,
            player: None,
            match_key: None,
            value,
            unit: StatisticType::YellowCards.unit(),
            period: Period::FullTime,
            aggregation: Aggregation::Total,
            sources: vec![StatisticSource {
                source: source.into(),
                tier,
                weight: tier.weight(),
                raw_value: value.to_string(),
                parsed_value: value,
                timestamp: Utc::now(),
                metadata: Default::default(),
            }],
        }
    }

    fn cards_query() -> StatisticQuery {
        StatisticQuery {
            query_type: StatisticQueryType::MatchStatistic,
            statistic_type: StatisticType::YellowCards,
            entities: QueryEntities::default(),
            aggregation: Aggregation::Total,
            period: Period::FullTime,
            threshold: None,
            comparator: None,
            event_end_time: None,
            can_resolve_now: true,
            raw_text: "yellow cards".into(),
        }
    }

    #[test]
    fn test_group_selection_by_provider_count() {
        let facts = vec![
            fact("A", "winner:lakers:k:d", 0.9, Some("FT")),
            fact("B", "winner:lakers:k:d", 0.8, Some("FT")),
            fact("C", "winner:lakers:k:d", 0.8, Some("FT")),
            fact("D", "winner:suns:k:d", 0.95, Some("FT")),
        ];
        let consensus = outcome_consensus(&facts);
        let accepted = consensus.accepted_group().unwrap();
        assert_eq!(accepted.key, "winner:lakers:k:d");
        assert_eq!(accepted.providers.len(), 3);
        assert_eq!(consensus.conflicts, 1);
        assert!(consensus.corroborated());
    }

    #[test]
    fn test_tie_broken_by_reliability() {
        let facts = vec![
            fact("A", "winner:lakers:k:d", 0.6, Some("FT")),
            fact("B", "winner:suns:k:d", 0.9, Some("FT")),
        ];
        let consensus = outcome_consensus(&facts);
        assert_eq!(consensus.accepted_group().unwrap().key, "winner:suns:k:d");
        assert!(!consensus.corroborated());
    }

    #[test]
    fn test_grouping_is_permutation_invariant() {
        let mut facts = vec![
            fact("A", "winner:lakers:k:d", 0.9, Some("FT")),
            fact("B", "winner:lakers:k:d", 0.8, None),
            fact("C", "winner:suns:k:d", 0.8, Some("FT")),
            fact("D", "winner:lakers:k:d", 0.7, Some("FT")),
        ];
        let forward = outcome_consensus(&facts);
        facts.reverse();
        let backward = outcome_consensus(&facts);
        assert_eq!(
            forward.accepted_group().unwrap().key,
            backward.accepted_group().unwrap().key
        );
        assert_eq!(forward.conflicts, backward.conflicts);
    }

    #[test]
    fn test_final_facts_restrict_group() {
        let facts = vec![
            fact("A", "winner:lakers:k:d", 0.9, Some("FT")),
            fact("B", "winner:lakers:k:d", 0.8, Some("1H")),
            fact("C", "winner:lakers:k:d", 0.8, Some("finished")),
        ];
        let consensus = outcome_consensus(&facts);
        let accepted = consensus.accepted_group().unwrap();
        // Providers keep the full count, facts narrow to the final ones.
        assert_eq!(accepted.providers.len(), 3);
        assert_eq!(accepted.facts.len(), 2);
    }

    #[test]
    fn test_statistic_consensus_scenario() {
        // OFFICIAL=4, OPTA=4, API_FOOTBALL=4, FLASHSCORE=3
        let stats = vec![
            observation("OFFICIAL_LEAGUE", Tier::Official, 4.0),
            observation("OPTA_STATS", Tier::Official, 4.0),
            observation("API_FOOTBALL", Tier::Industry, 4.0),
            observation("FLASHSCORE", Tier::Media, 3.0),
        ];
        let consensus = statistic_consensus(&stats, &cards_query());
        assert!(consensus.agreed);
        assert_eq!(consensus.agreed_value, Some(4.0));
        assert_eq!(consensus.agreement_count, 3);
        assert_eq!(consensus.outliers.len(), 1);
        assert_eq!(consensus.outliers[0].source, "FLASHSCORE");
        assert_eq!(consensus.outliers[0].value, 3.0);
        assert!(consensus.official_source_present);
        assert_eq!(consensus.stats_provider_count, 1);
        assert!(consensus.variance <= 1.0);
    }

    #[test]
    fn test_no_stats_provider_blocks_agreement() {
        let stats = vec![
            observation("FLASHSCORE", Tier::Media, 4.0),
            observation("SOFASCORE", Tier::Media, 4.0),
            observation("THESPORTSDB", Tier::Aggregator, 4.0),
        ];
        let consensus = statistic_consensus(&stats, &cards_query());
        assert_eq!(consensus.agreement_count, 3);
        assert_eq!(consensus.stats_provider_count, 0);
        assert!(!consensus.agreed);
    }

    #[test]
    fn test_value_tie_breaks_to_smaller() {
        let stats = vec![
            observation("OPTA_STATS", Tier::Official, 5.0),
            observation("STATSBOMB", Tier::Official, 3.0),
        ];
        let consensus = statistic_consensus(&stats, &cards_query());
        assert!(!consensus.agreed);
        assert_eq!(consensus.agreement_count, 1);
        // Both values have one peer; the smaller wins the scan.
        assert_eq!(
            consensus.outliers.iter().filter(|o| o.value == 5.0).count(),
            1
        );
    }

    #[test]
    fn test_entity_filter_drops_other_team() {
        let mut query = cards_query();
        query.entities.team = Some("Arsenal".into());

        let mut arsenal = observation("OPTA_STATS", Tier::Official, 2.0);
        arsenal.team = Some("Arsenal".into());
        let mut chelsea = observation("STATSBOMB", Tier::Official, 3.0);
        chelsea.team = Some("Chelsea".into());
        let unattributed = observation("API_FOOTBALL", Tier::Industry, 2.0);

        let consensus = statistic_consensus(&[arsenal, chelsea, unattributed], &query);
        // Chelsea's row is filtered; Arsenal + the unattributed row remain.
        assert_eq!(consensus.agreement_count, 2);
    }

    #[test]
    fn test_permutation_invariant_statistics() {
        let mut stats = vec![
            observation("OFFICIAL_LEAGUE", Tier::Official, 4.0),
            observation("OPTA_STATS", Tier::Official, 4.0),
            observation("API_FOOTBALL", Tier::Industry, 4.0),
            observation("FLASHSCORE", Tier::Media, 3.0),
        ];
        let forward = statistic_consensus(&stats, &cards_query());
        stats.reverse();
        let backward = statistic_consensus(&stats, &cards_query());
        assert_eq!(forward.agreed_value, backward.agreed_value);
        assert_eq!(forward.agreement_count, backward.agreement_count);
    }
}
