//! Statistic payload walker
//!
//! Statistics providers disagree wildly on shape, so this adapter walks the
//! untyped JSON recursively with explicit alias tables instead of per-shape
//! deserialization. Object strategy order: known sub-arrays, embedded text,
//! a `value` field with a type sibling, synonym-keyed primitives, then
//! nested recursion.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use arbiter_core::{
    text::teams_key, Aggregation, NormalizedStatistic, Period, ProviderResponse, StatisticQuery,
    StatisticSource, StatisticType,
};

use crate::synonyms::match_statistic_key;

const SUB_ARRAY_KEYS: [&str; 3] = ["statistics", "data", "items"];
const TYPE_SIBLING_KEYS: [&str; 4] = ["type", "statType", "label", "name"];

#[derive(Debug, Clone)]
struct Candidate {
    statistic_type: StatisticType,
    value: f64,
    raw_value: String,
    team: Option<String>,
    player: Option<String>,
}

/// Normalize one provider envelope into statistic observations.
pub fn normalize_statistics(
    response: &ProviderResponse,
    query: &StatisticQuery,
) -> Vec<NormalizedStatistic> {
    let mut candidates = Vec::new();
    walk(&response.payload, query, None, None, &mut candidates);

    // One provider asserting the same value twice is still one observation.
    let mut seen: Vec<(StatisticType, Option<String>, Option<String>, u64)> = Vec::new();
    candidates.retain(|c| {
        let key = (
            c.statistic_type,
            c.team.clone(),
            c.player.clone(),
            c.value.to_bits(),
        );
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });

    let match_key = query.entities.match_info.as_ref().and_then(|m| {
        match (&m.home, &m.away) {
            (Some(home), Some(away)) => {
                let date = m.date.map(|d| d.to_string()).unwrap_or_default();
                Some(format!(
                    "{}:{}",
                    teams_key(&[home.clone(), away.clone()]),
                    date
                ))
            }
            _ => None,
        }
    });

    candidates
        .into_iter()
        .map(|c| {
            let inherits = c.statistic_type == query.statistic_type;
            NormalizedStatistic {
                statistic_type: c.statistic_type,
                team: c.team,
                player: c.player,
                match_key: match_key.clone(),
                value: c.value,
                unit: c.statistic_type.unit(),
                period: if inherits { query.period } else { Period::FullTime },
                aggregation: if inherits {
                    query.aggregation
                } else {
                    Aggregation::Total
                },
                sources: vec![StatisticSource {
                    source: response.provider.clone(),
                    tier: response.tier,
                    weight: response.weight,
                    raw_value: c.raw_value,
                    parsed_value: c.value,
                    timestamp: response.collected_at,
                    metadata: Default::default(),
                }],
            }
        })
        .collect()
}

fn walk(
    value: &Value,
    query: &StatisticQuery,
    team: Option<&str>,
    player: Option<&str>,
    out: &mut Vec<Candidate>,
) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk(item, query, team, player, out);
            }
        }
        Value::String(s) => {
            if let Some((value, raw)) = first_number(s) {
                out.push(candidate(query.statistic_type, value, raw, team, player));
            }
        }
        Value::Number(n) => {
            if let Some(value) = n.as_f64() {
                out.push(candidate(
                    query.statistic_type,
                    value,
                    n.to_string(),
                    team,
                    player,
                ));
            }
        }
        Value::Object(map) => {
            // Entity context carried down from the enclosing object.
            let team = map
                .get("team")
                .and_then(Value::as_str)
                .or(team);
            let player = map
                .get("player")
                .and_then(Value::as_str)
                .or(player);

            // (a) known sub-arrays
            let mut descended = false;
            for key in SUB_ARRAY_KEYS {
                if let Some(Value::Array(items)) = map.get(key) {
                    for item in items {
                        walk(item, query, team, player, out);
                    }
                    descended = true;
                }
            }
            if descended {
                return;
            }

            // (b) embedded text field
            if let Some(Value::String(text)) = map.get("text") {
                if let Some((value, raw)) = first_number(text) {
                    out.push(candidate(query.statistic_type, value, raw, team, player));
                }
                return;
            }

            // (c) value field with a type sibling
            if let Some(value_field) = map.get("value") {
                if let Some((value, raw)) = primitive_number(value_field) {
                    let statistic_type = TYPE_SIBLING_KEYS
                        .iter()
                        .filter_map(|k| map.get(*k).and_then(Value::as_str))
                        .find_map(match_statistic_key)
                        .unwrap_or(query.statistic_type);
                    out.push(candidate(statistic_type, value, raw, team, player));
                }
                return;
            }

            // (d) synonym-keyed primitives, (e) recursion into the rest
            for (key, nested) in map {
                if let Some(statistic_type) = match_statistic_key(key) {
                    if let Some((value, raw)) = primitive_number(nested) {
                        out.push(candidate(statistic_type, value, raw, team, player));
                        continue;
                    }
                }
                if nested.is_object() || nested.is_array() {
                    walk(nested, query, team, player, out);
                }
            }
        }
        _ => {}
    }
}

fn candidate(
    statistic_type: StatisticType,
    value: f64,
    raw_value: String,
    team: Option<&str>,
    player: Option<&str>,
) -> Candidate {
    Candidate {
        statistic_type,
        value,
        raw_value,
        team: team.map(str::to_string),
        player: player.map(str::to_string),
    }
}

fn number_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("static regex"))
}

/// First numeric token of a string, with the raw token preserved.
fn first_number(s: &str) -> Option<(f64, String)> {
    let token = number_regex().find(s)?;
    let raw = token.as_str().to_string();
    raw.parse::<f64>().ok().map(|v| (v, raw))
}

/// A primitive (number or numeric string) value, or nothing.
fn primitive_number(value: &Value) -> Option<(f64, String)> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| (v, n.to_string())),
        Value::String(s) => first_number(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{MatchEntities, QueryEntities, StatisticQueryType, Tier, Unit};
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn cards_query() -> StatisticQuery {
        StatisticQuery {
            query_type: StatisticQueryType::MatchStatistic,
            statistic_type: StatisticType::YellowCards,
            entities: QueryEntities {
                match_info: Some(MatchEntities {
                    home: Some("Arsenal".into()),
                    away: Some("Chelsea".into()),
                    date: NaiveDate::from_ymd_opt(2024, 11, 5),
                    competition: None,
                    id: None,
                }),
                team: None,
                player: None,
            },
            aggregation: Aggregation::Total,
            period: Period::FullTime,
            threshold: None,
            comparator: None,
            event_end_time: None,
            can_resolve_now: true,
            raw_text: "total yellow cards arsenal vs chelsea".into(),
        }
    }

    fn envelope(provider: &str, payload: Value) -> ProviderResponse {
        ProviderResponse {
            provider: provider.into(),
            tier: Tier::Official,
            weight: 0.45,
            collected_at: Utc::now(),
            payload,
            meta: Default::default(),
        }
    }

    #[test]
    fn test_sub_array_with_typed_values() {
        let payload = json!({
            "statistics": [
                {"type": "yellow_cards", "value": 4},
                {"type": "corners", "value": 11}
            ]
        });
        let stats = normalize_statistics(&envelope("OPTA_STATS", payload), &cards_query());
        assert_eq!(stats.len(), 2);

        let cards = stats
            .iter()
            .find(|s| s.statistic_type == StatisticType::YellowCards)
            .unwrap();
        assert_eq!(cards.value, 4.0);
        assert_eq!(cards.unit, Unit::Count);
        assert_eq!(cards.sources[0].source, "OPTA_STATS");
        assert!(cards.match_key.as_deref().unwrap().contains("arsenal|chelsea"));
    }

    #[test]
    fn test_synonym_keyed_primitives() {
        let payload = json!({
            "data": [
                {"team": "Arsenal", "yellowCards": 2, "fouls": "11"},
                {"team": "Chelsea", "yellowCards": "2", "fouls": 14}
            ]
        });
        let stats = normalize_statistics(&envelope("API_FOOTBALL", payload), &cards_query());

        let arsenal: Vec<_> = stats
            .iter()
            .filter(|s| s.team.as_deref() == Some("Arsenal"))
            .collect();
        assert_eq!(arsenal.len(), 2);
        assert!(arsenal
            .iter()
            .any(|s| s.statistic_type == StatisticType::YellowCards && s.value == 2.0));
        assert!(arsenal
            .iter()
            .any(|s| s.statistic_type == StatisticType::Fouls && s.value == 11.0));
    }

    #[test]
    fn test_embedded_text_inherits_query_type() {
        let payload = json!({"text": "4 yellow cards were shown in total"});
        let stats = normalize_statistics(&envelope("FLASHSCORE", payload), &cards_query());
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].statistic_type, StatisticType::YellowCards);
        assert_eq!(stats[0].value, 4.0);
        assert_eq!(stats[0].period, Period::FullTime);
        assert_eq!(stats[0].aggregation, Aggregation::Total);
    }

    #[test]
    fn test_string_leaf_extracts_first_number() {
        let payload = json!(["4 cards", "irrelevant"]);
        let stats = normalize_statistics(&envelope("SOFASCORE", payload), &cards_query());
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].value, 4.0);
    }

    #[test]
    fn test_percentage_statistic_unit() {
        let mut query = cards_query();
        query.statistic_type = StatisticType::Possession;
        let payload = json!({
            "statistics": [{"type": "possession", "value": "56%"}]
        });
        let stats = normalize_statistics(&envelope("OPTA_STATS", payload), &query);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].value, 56.0);
        assert_eq!(stats[0].unit, Unit::Percentage);
    }

    #[test]
    fn test_duplicate_observations_collapse() {
        let payload = json!({
            "statistics": [
                {"type": "yellow_cards", "value": 4},
                {"type": "yellow_cards", "value": 4}
            ]
        });
        let stats = normalize_statistics(&envelope("OPTA_STATS", payload), &cards_query());
        assert_eq!(stats.len(), 1);
    }

    #[test]
    fn test_nested_objects_are_reached() {
        let payload = json!({
            "match": {"details": {"discipline": {"yellow_cards": 4}}}
        });
        let stats = normalize_statistics(&envelope("OFFICIAL_LEAGUE", payload), &cards_query());
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].statistic_type, StatisticType::YellowCards);
        assert_eq!(stats[0].value, 4.0);
    }
}
