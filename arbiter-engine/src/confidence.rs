//! Confidence scoring
//!
//! Outcome path: stepped base from corroboration plus additive adjustments.
//! Statistic path: weighted sum of agreement signals with multiplicative
//! penalties. Every applied adjustment is recorded so the score can be
//! audited from the evidence alone.

use chrono::{DateTime, Utc};

use arbiter_core::{
    ConfidenceAdjustment, ConfidenceBreakdown, NormalizedStatistic, StatisticConsensus,
    ValidationReport,
};

use crate::consensus::OutcomeConsensus;

/// Facts newer than this count as fresh for the outcome bonus.
const FRESHNESS_WINDOW_HOURS: i64 = 72;

fn additive(factor: &str, amount: f64, reason: impl Into<String>) -> ConfidenceAdjustment {
    ConfidenceAdjustment {
        factor: factor.to_string(),
        amount,
        multiplicative: false,
        reason: reason.into(),
    }
}

fn multiplicative(factor: &str, amount: f64, reason: impl Into<String>) -> ConfidenceAdjustment {
    ConfidenceAdjustment {
        factor: factor.to_string(),
        amount,
        multiplicative: true,
        reason: reason.into(),
    }
}

/// Outcome-path confidence.
pub fn outcome_confidence(consensus: &OutcomeConsensus, now: DateTime<Utc>) -> ConfidenceBreakdown {
    let mut adjustments = Vec::new();

    let providers = consensus
        .accepted_group()
        .map(|g| g.providers.len())
        .unwrap_or(0);
    let base = match providers {
        0..=2 => 0.3,
        3 => 0.6,
        4 => 0.75,
        _ => 0.9,
    };
    adjustments.push(additive(
        "corroboration",
        base,
        format!("{} distinct providers in accepted group", providers),
    ));
    let mut score = base;

    let conflict_penalty = f64::min(0.25, consensus.conflicts as f64 * 0.1);
    if conflict_penalty > 0.0 {
        adjustments.push(additive(
            "conflicts",
            -conflict_penalty,
            format!("{} conflicting groups", consensus.conflicts),
        ));
        score -= conflict_penalty;
    }

    if let Some(group) = consensus.accepted_group() {
        let reliability_delta = (group.reliability_average - 0.7) * 0.15;
        adjustments.push(additive(
            "reliability",
            reliability_delta,
            format!("average reliability {:.2}", group.reliability_average),
        ));
        score += reliability_delta;

        let total = group.facts.len();
        let fresh = group
            .facts
            .iter()
            .filter(|f| {
                f.end_timestamp
                    .map(|t| now - t <= chrono::Duration::hours(FRESHNESS_WINDOW_HOURS))
                    .unwrap_or(false)
            })
            .count();
        let freshness_bonus = if total > 0 && fresh == total {
            0.05
        } else if total > 0 && fresh * 2 > total {
            0.02
        } else {
            0.0
        };
        if freshness_bonus > 0.0 {
            adjustments.push(additive(
                "freshness",
                freshness_bonus,
                format!("{}/{} facts within {}h", fresh, total, FRESHNESS_WINDOW_HOURS),
            ));
            score += freshness_bonus;
        }
    }

    ConfidenceBreakdown {
        score: score.clamp(0.0, 1.0),
        adjustments,
    }
}

/// Freshness factor from the average source age.
fn freshness_factor(avg_age_minutes: f64) -> f64 {
    if avg_age_minutes <= 15.0 {
        1.0
    } else if avg_age_minutes <= 60.0 {
        0.8
    } else if avg_age_minutes <= 180.0 {
        0.6
    } else if avg_age_minutes <= 720.0 {
        0.4
    } else {
        0.2
    }
}

/// Statistic-path confidence.
pub fn statistic_confidence(
    consensus: &StatisticConsensus,
    validation: &ValidationReport,
    statistics: &[NormalizedStatistic],
    now: DateTime<Utc>,
) -> ConfidenceBreakdown {
    let mut adjustments = Vec::new();
    let tolerance = consensus.unit.tolerance();
    let sources_total = consensus.agreement_count + consensus.outliers.len();

    let stats_agreement = if consensus.stats_provider_count >= 1 {
        0.40
    } else {
        0.0
    };
    adjustments.push(additive(
        "stats_provider_agreement",
        stats_agreement,
        format!("{} dedicated stats providers agree", consensus.stats_provider_count),
    ));

    let tier1 = if consensus.tier1_count >= 1 { 0.25 } else { 0.0 };
    adjustments.push(additive(
        "tier1_agreement",
        tier1,
        format!("{} tier-1 sources agree", consensus.tier1_count),
    ));

    let corroboration = f64::min(
        1.0,
        consensus.agreement_count as f64 / usize::max(3, sources_total) as f64,
    ) * 0.15;
    adjustments.push(additive(
        "corroboration",
        corroboration,
        format!("{}/{} observations agree", consensus.agreement_count, sources_total),
    ));

    let betting = if consensus.betting_market_alignment {
        0.10
    } else {
        0.0
    };
    adjustments.push(additive(
        "betting_market_alignment",
        betting,
        "betting market agrees with consensus value",
    ));

    let low_variance = (1.0 - consensus.variance / tolerance).clamp(0.0, 1.0) * 0.05;
    adjustments.push(additive(
        "low_variance",
        low_variance,
        format!("variance {:.3} against tolerance {}", consensus.variance, tolerance),
    ));

    let ages: Vec<f64> = statistics
        .iter()
        .filter(|s| s.statistic_type == consensus.statistic_type)
        .flat_map(|s| s.sources.iter())
        .map(|src| (now - src.timestamp).num_seconds() as f64 / 60.0)
        .collect();
    let avg_age = if ages.is_empty() {
        f64::INFINITY
    } else {
        ages.iter().sum::<f64>() / ages.len() as f64
    };
    let freshness = freshness_factor(avg_age) * 0.05;
    adjustments.push(additive(
        "data_freshness",
        freshness,
        format!("average source age {:.0} minutes", avg_age.min(1e6)),
    ));

    let mut score =
        stats_agreement + tier1 + corroboration + betting + low_variance + freshness;

    if consensus.variance > 2.0 {
        adjustments.push(multiplicative(
            "high_variance",
            0.8,
            format!("variance {:.2} above 2", consensus.variance),
        ));
        score *= 0.8;
    }
    if consensus.outliers.len() >= 2 {
        adjustments.push(multiplicative(
            "outliers",
            0.9,
            format!("{} outlying observations", consensus.outliers.len()),
        ));
        score *= 0.9;
    }
    if validation
        .warnings
        .iter()
        .any(|w| w.contains("Unusual value"))
    {
        adjustments.push(multiplicative(
            "unusual_values",
            0.95,
            "range validation flagged unusual values",
        ));
        score *= 0.95;
    }

    ConfidenceBreakdown {
        score: score.clamp(0.0, 1.0),
        adjustments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::outcome_consensus;
    use arbiter_core::{FactCategory, NormalizedFact, Outlier, StatisticType, Unit};
    use serde_json::Value;

    fn fact(provider: &str, reliability: f64, age_hours: i64) -> NormalizedFact {
        NormalizedFact {
            id: provider.into(),
            provider: provider.into(),
            canonical_key: "winner:lakers:lakers|suns:2025-01-15".into(),
            display: "Lakers beat Suns".into(),
            category: FactCategory::Result,
            home_team: None,
            away_team: None,
            winner: Some("Lakers".into()),
            home_score: None,
            away_score: None,
            award: None,
            player: None,
            status: Some("FT".into()),
            end_timestamp: Some(Utc::now() - chrono::Duration::hours(age_hours)),
            source_url: None,
            reliability,
            raw: Value::Null,
        }
    }

    #[test]
    fn test_outcome_base_steps() {
        for (n, expected_base) in [(2usize, 0.3), (3, 0.6), (4, 0.75), (5, 0.9)] {
            let facts: Vec<NormalizedFact> = (0..n)
                .map(|i| fact(&format!("P{}", i), 0.7, 10))
                .collect();
            let consensus = outcome_consensus(&facts);
            let breakdown = outcome_confidence(&consensus, Utc::now());
            let base = breakdown
                .adjustments
                .iter()
                .find(|a| a.factor == "corroboration")
                .unwrap()
                .amount;
            assert_eq!(base, expected_base, "base for {} providers", n);
        }
    }

    #[test]
    fn test_outcome_fresh_facts_bonus() {
        let facts = vec![
            fact("A", 0.7, 10),
            fact("B", 0.7, 10),
            fact("C", 0.7, 10),
        ];
        let consensus = outcome_consensus(&facts);
        let breakdown = outcome_confidence(&consensus, Utc::now());
        // base 0.6, reliability delta 0, all fresh +0.05
        assert!((breakdown.score - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_outcome_conflict_penalty_caps() {
        let mut facts: Vec<NormalizedFact> = (0..5)
            .map(|i| fact(&format!("P{}", i), 0.7, 10))
            .collect();
        for i in 0..4 {
            let mut conflicting = fact(&format!("Q{}", i), 0.7, 10);
            conflicting.canonical_key = format!("winner:other{}:k:d", i);
            facts.push(conflicting);
        }
        let consensus = outcome_consensus(&facts);
        assert_eq!(consensus.conflicts, 4);
        let breakdown = outcome_confidence(&consensus, Utc::now());
        let penalty = breakdown
            .adjustments
            .iter()
            .find(|a| a.factor == "conflicts")
            .unwrap()
            .amount;
        assert_eq!(penalty, -0.25);
    }

    #[test]
    fn test_confidence_always_clamped() {
        let facts: Vec<NormalizedFact> = (0..8)
            .map(|i| fact(&format!("P{}", i), 1.0, 1))
            .collect();
        let consensus = outcome_consensus(&facts);
        let breakdown = outcome_confidence(&consensus, Utc::now());
        assert!(breakdown.score <= 1.0 && breakdown.score >= 0.0);
    }

    fn consensus_fixture() -> StatisticConsensus {
        StatisticConsensus {
            statistic_type: StatisticType::YellowCards,
            agreed: true,
            agreed_value: Some(4.0),
            unit: Unit::Count,
            agreement_count: 3,
            variance: 0.1875,
            outliers: vec![Outlier {
                source: "FLASHSCORE".into(),
                value: 3.0,
            }],
            tier1_count: 2,
            stats_provider_count: 1,
            official_source_present: true,
            betting_market_alignment: false,
            supporting_sources: vec![
                "API_FOOTBALL".into(),
                "OFFICIAL_LEAGUE".into(),
                "OPTA_STATS".into(),
            ],
        }
    }

    #[test]
    fn test_statistic_scenario_confidence() {
        let breakdown = statistic_confidence(
            &consensus_fixture(),
            &ValidationReport {
                within_range: true,
                logically_consistent: true,
                warnings: vec![],
                invalid_sources: vec![],
            },
            &[],
            Utc::now(),
        );
        // 0.40 + 0.25 + (3/4)*0.15 + 0 + 0.040625 + stale-freshness 0.01
        assert!(breakdown.score >= 0.65, "score {}", breakdown.score);
    }

    #[test]
    fn test_statistic_penalties_multiply() {
        let mut consensus = consensus_fixture();
        consensus.variance = 2.5;
        consensus.outliers.push(Outlier {
            source: "X".into(),
            value: 9.0,
        });
        let breakdown = statistic_confidence(
            &consensus,
            &ValidationReport {
                within_range: true,
                logically_consistent: true,
                warnings: vec!["Unusual value: yellow_cards = 11".into()],
                invalid_sources: vec![],
            },
            &[],
            Utc::now(),
        );
        let multipliers: Vec<f64> = breakdown
            .adjustments
            .iter()
            .filter(|a| a.multiplicative)
            .map(|a| a.amount)
            .collect();
        assert_eq!(multipliers, vec![0.8, 0.9, 0.95]);
        assert!(breakdown.score < 0.65);
    }

    #[test]
    fn test_freshness_ladder() {
        assert_eq!(freshness_factor(10.0), 1.0);
        assert_eq!(freshness_factor(45.0), 0.8);
        assert_eq!(freshness_factor(120.0), 0.6);
        assert_eq!(freshness_factor(600.0), 0.4);
        assert_eq!(freshness_factor(10_000.0), 0.2);
    }
}
