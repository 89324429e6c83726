//! Outcome payload adapters
//!
//! One small adapter per provider family. Every surviving row becomes a
//! `NormalizedFact` with a canonical key; key precedence is award > winner
//! > score, and a row from which none can be derived is dropped.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

use arbiter_core::{
    text::{names_match, normalize_name, teams_key},
    FactCategory, NormalizedFact, OutcomeQuery, ProviderResponse,
};

/// Result verbs accepted in RSS headlines, `"A <verb> B"`.
const RESULT_VERBS: &[&str] = &["defeat", "beat", "tops", "edges", "wins", "past", "overcome"];

/// Reliability table. RSS feeds are capped low so headlines can corroborate
/// structured providers but never outvote them.
pub fn provider_reliability(provider: &str) -> f64 {
    match provider {
        "OFFICIAL_LEAGUE" => 0.95,
        "OPTA_STATS" | "STATSBOMB" => 0.92,
        "SPORTSRADAR" => 0.9,
        "API_FOOTBALL" | "API_BASKETBALL" => 0.9,
        "THE_ODDS_API" => 0.85,
        "FLASHSCORE" | "SOFASCORE" => 0.8,
        "THESPORTSDB" => 0.8,
        p if p.starts_with("rss:") => {
            if p.contains("espn") || p.contains("bbc") {
                0.6
            } else {
                0.55
            }
        }
        _ => 0.5,
    }
}

/// Intermediate row shared by all adapters before key derivation.
#[derive(Debug)]
struct OutcomeRow {
    home_team: Option<String>,
    away_team: Option<String>,
    winner: Option<String>,
    home_score: Option<i64>,
    away_score: Option<i64>,
    award: Option<String>,
    player: Option<String>,
    status: Option<String>,
    date: Option<String>,
    source_url: Option<String>,
    category: FactCategory,
    display: String,
}

impl Default for OutcomeRow {
    fn default() -> Self {
        Self {
            home_team: None,
            away_team: None,
            winner: None,
            home_score: None,
            away_score: None,
            award: None,
            player: None,
            status: None,
            date: None,
            source_url: None,
            category: FactCategory::Result,
            display: String::new(),
        }
    }
}

/// Normalize one provider envelope into outcome facts.
pub fn normalize_outcome(response: &ProviderResponse, query: &OutcomeQuery) -> Vec<NormalizedFact> {
    let provider = response.provider.as_str();
    let rows = if provider.starts_with("rss:") {
        rss_rows(&response.payload, query)
    } else {
        match provider {
            "THESPORTSDB" => sportsdb_rows(&response.payload, query),
            "API_FOOTBALL" | "API_BASKETBALL" => api_sports_rows(&response.payload, query),
            "THE_ODDS_API" => odds_api_rows(&response.payload, query),
            _ => {
                debug!("no outcome adapter for provider {}", provider);
                Vec::new()
            }
        }
    };

    let reliability = provider_reliability(provider);
    rows.into_iter()
        .filter_map(|row| build_fact(provider, reliability, row, query))
        .collect()
}

fn build_fact(
    provider: &str,
    reliability: f64,
    row: OutcomeRow,
    query: &OutcomeQuery,
) -> Option<NormalizedFact> {
    let key = canonical_key(&row, query)?;
    let id = NormalizedFact::fingerprint(provider, &key, &row.display);
    Some(NormalizedFact {
        id,
        provider: provider.to_string(),
        canonical_key: key,
        display: row.display,
        category: row.category,
        home_team: row.home_team,
        away_team: row.away_team,
        winner: row.winner,
        home_score: row.home_score,
        away_score: row.away_score,
        award: row.award,
        player: row.player,
        status: row.status,
        end_timestamp: None,
        source_url: row.source_url,
        reliability,
        raw: Value::Null,
    })
}

/// Key precedence: award, then winner, then scoreline; a row with none is
/// discarded.
fn canonical_key(row: &OutcomeRow, query: &OutcomeQuery) -> Option<String> {
    // Key dates are day precision; timestamps from providers are trimmed
    // so they group with plain dates.
    let date = query
        .date
        .map(|d| d.to_string())
        .or_else(|| {
            row.date
                .as_ref()
                .map(|d| d.split('T').next().unwrap_or(d.as_str()).to_string())
        })
        .unwrap_or_default();
    let key_teams = match (&row.home_team, &row.away_team) {
        (Some(home), Some(away)) => teams_key(&[home.clone(), away.clone()]),
        _ => teams_key(&query.teams),
    };

    if let (Some(award), Some(player)) = (&row.award, &row.player) {
        return Some(format!(
            "award:{}:{}:{}:{}",
            normalize_name(award),
            normalize_name(player),
            key_teams,
            date
        ));
    }
    if let Some(winner) = &row.winner {
        return Some(format!(
            "winner:{}:{}:{}",
            normalize_name(winner),
            key_teams,
            date
        ));
    }
    if let (Some(hs), Some(aw)) = (row.home_score, row.away_score) {
        return Some(format!("score:{}:{}-{}:{}", key_teams, hs, aw, date));
    }
    None
}

fn teams_intersect(query: &OutcomeQuery, home: Option<&str>, away: Option<&str>) -> bool {
    if query.teams.is_empty() {
        return true;
    }
    query.teams.iter().any(|team| {
        home.map(|h| names_match(h, team)).unwrap_or(false)
            || away.map(|a| names_match(a, team)).unwrap_or(false)
    })
}

fn date_prefix_matches(query: &OutcomeQuery, row_date: Option<&str>) -> bool {
    match (query.date, row_date) {
        (Some(query_date), Some(row_date)) => row_date.starts_with(&query_date.to_string()),
        _ => true,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn int_field(value: &Value, key: &str) -> Option<i64> {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn winner_from_scores(
    home: Option<&str>,
    away: Option<&str>,
    home_score: Option<i64>,
    away_score: Option<i64>,
) -> Option<String> {
    match (home_score, away_score) {
        (Some(hs), Some(aws)) if hs > aws => home.map(str::to_string),
        (Some(hs), Some(aws)) if aws > hs => away.map(str::to_string),
        _ => None,
    }
}

// --- TheSportsDB -----------------------------------------------------------

fn sportsdb_rows(payload: &Value, query: &OutcomeQuery) -> Vec<OutcomeRow> {
    let mut rows = Vec::new();
    for list_key in ["events", "results"] {
        let Some(items) = payload.get(list_key).and_then(Value::as_array) else {
            continue;
        };
        for item in items {
            let home = str_field(item, "strHomeTeam");
            let away = str_field(item, "strAwayTeam");
            let date = str_field(item, "dateEvent");

            if !teams_intersect(query, home, away) || !date_prefix_matches(query, date) {
                continue;
            }

            let home_score = int_field(item, "intHomeScore");
            let away_score = int_field(item, "intAwayScore");
            let mut winner = winner_from_scores(home, away, home_score, away_score);
            if winner.is_none() {
                if let Some(result) = str_field(item, "strResult") {
                    winner = [home, away]
                        .into_iter()
                        .flatten()
                        .find(|team| names_match(result, team) || result.contains(*team))
                        .map(str::to_string);
                }
            }

            let display = match (home, away, home_score, away_score) {
                (Some(h), Some(a), Some(hs), Some(aws)) => format!("{} {}-{} {}", h, hs, aws, a),
                (Some(h), Some(a), _, _) => format!("{} vs {}", h, a),
                _ => "event".to_string(),
            };

            rows.push(OutcomeRow {
                home_team: home.map(str::to_string),
                away_team: away.map(str::to_string),
                winner,
                home_score,
                away_score,
                status: str_field(item, "strStatus").map(str::to_string),
                date: date.map(str::to_string),
                category: FactCategory::Result,
                display,
                ..Default::default()
            });
        }
    }
    rows
}

// --- API-Sports (soccer and basketball) ------------------------------------

fn api_sports_rows(payload: &Value, query: &OutcomeQuery) -> Vec<OutcomeRow> {
    let Some(items) = payload.get("response").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for item in items {
        let teams = item.get("teams");
        let home = teams
            .and_then(|t| t.get("home"))
            .and_then(|t| str_field(t, "name"));
        let away = teams
            .and_then(|t| t.get("away"))
            .and_then(|t| str_field(t, "name"));

        let date = item
            .get("fixture")
            .and_then(|f| str_field(f, "date"))
            .or_else(|| str_field(item, "date"));

        if !teams_intersect(query, home, away) || !date_prefix_matches(query, date) {
            continue;
        }

        let (home_score, away_score) = api_sports_scores(item);

        // Explicit winner booleans take precedence over score comparison.
        let flagged_winner = teams.and_then(|t| {
            let home_flag = t
                .get("home")
                .and_then(|h| h.get("winner"))
                .and_then(Value::as_bool);
            let away_flag = t
                .get("away")
                .and_then(|a| a.get("winner"))
                .and_then(Value::as_bool);
            match (home_flag, away_flag) {
                (Some(true), _) => home.map(str::to_string),
                (_, Some(true)) => away.map(str::to_string),
                _ => None,
            }
        });
        let winner =
            flagged_winner.or_else(|| winner_from_scores(home, away, home_score, away_score));

        let status = item
            .get("fixture")
            .and_then(|f| f.get("status"))
            .and_then(|s| s.get("short").or_else(|| s.get("long")))
            .and_then(Value::as_str)
            .or_else(|| {
                item.get("status")
                    .and_then(|s| s.get("short").or_else(|| s.get("long")))
                    .and_then(Value::as_str)
            })
            .or_else(|| str_field(item, "status"));

        let display = match (home, away, home_score, away_score) {
            (Some(h), Some(a), Some(hs), Some(aws)) => format!("{} {}-{} {}", h, hs, aws, a),
            (Some(h), Some(a), _, _) => format!("{} vs {}", h, a),
            _ => "fixture".to_string(),
        };

        rows.push(OutcomeRow {
            home_team: home.map(str::to_string),
            away_team: away.map(str::to_string),
            winner,
            home_score,
            away_score,
            status: status.map(str::to_string),
            date: date.map(str::to_string),
            category: FactCategory::Result,
            display,
            ..Default::default()
        });
    }
    rows
}

/// Score preference: scores.fulltime, then scores.final, then goals, then
/// the basketball per-side totals.
fn api_sports_scores(item: &Value) -> (Option<i64>, Option<i64>) {
    for scores_key in ["score", "scores"] {
        let Some(scores) = item.get(scores_key) else {
            continue;
        };
        for period_key in ["fulltime", "final"] {
            if let Some(period) = scores.get(period_key) {
                let home = int_field(period, "home");
                let away = int_field(period, "away");
                if home.is_some() && away.is_some() {
                    return (home, away);
                }
            }
        }
    }

    if let Some(goals) = item.get("goals") {
        let home = int_field(goals, "home");
        let away = int_field(goals, "away");
        if home.is_some() && away.is_some() {
            return (home, away);
        }
    }

    if let Some(scores) = item.get("scores") {
        let home = scores.get("home").and_then(|side| int_field(side, "total"));
        let away = scores.get("away").and_then(|side| int_field(side, "total"));
        if home.is_some() && away.is_some() {
            return (home, away);
        }
    }

    (None, None)
}

// --- The Odds API -----------------------------------------------------------

fn odds_api_rows(payload: &Value, query: &OutcomeQuery) -> Vec<OutcomeRow> {
    let Some(items) = payload.as_array() else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for item in items {
        let home = str_field(item, "home_team");
        let away = str_field(item, "away_team");
        let date = str_field(item, "commence_time");

        if !teams_intersect(query, home, away) || !date_prefix_matches(query, date) {
            continue;
        }

        let mut home_score = None;
        let mut away_score = None;
        if let Some(scores) = item.get("scores").and_then(Value::as_array) {
            for entry in scores {
                let Some(name) = str_field(entry, "name") else {
                    continue;
                };
                let score = int_field(entry, "score");
                if home.map(|h| names_match(h, name)).unwrap_or(false) {
                    home_score = score;
                } else if away.map(|a| names_match(a, name)).unwrap_or(false) {
                    away_score = score;
                }
            }
        }

        let completed = item
            .get("completed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let winner = winner_from_scores(home, away, home_score, away_score);

        let display = match (home, away, home_score, away_score) {
            (Some(h), Some(a), Some(hs), Some(aws)) => format!("{} {}-{} {}", h, hs, aws, a),
            (Some(h), Some(a), _, _) => format!("{} vs {}", h, a),
            _ => "event".to_string(),
        };

        rows.push(OutcomeRow {
            home_team: home.map(str::to_string),
            away_team: away.map(str::to_string),
            winner,
            home_score,
            away_score,
            status: completed.then(|| "finished".to_string()),
            date: date.map(str::to_string),
            category: FactCategory::Result,
            display,
            ..Default::default()
        });
    }
    rows
}

// --- RSS headlines -----------------------------------------------------------

fn verb_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        let alternation = RESULT_VERBS.join("|");
        Regex::new(&format!(r"\b({})\b", alternation)).expect("static regex")
    })
}

/// Conservative headline heuristic: at least two configured teams must
/// appear in the title and the winner must lead the verb.
fn rss_rows(payload: &Value, query: &OutcomeQuery) -> Vec<OutcomeRow> {
    let Some(items) = payload.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    if query.teams.is_empty() {
        return Vec::new();
    }

    let mut rows = Vec::new();
    for item in items {
        let Some(title) = str_field(item, "title") else {
            continue;
        };
        let lower = title.to_lowercase();

        let present: Vec<&String> = query
            .teams
            .iter()
            .filter(|team| lower.contains(team.to_lowercase().as_str()))
            .collect();
        if present.len() < usize::min(2, query.teams.len()) {
            continue;
        }

        let Some(verb) = verb_regex().find(&lower) else {
            continue;
        };
        let leading = &lower[..verb.start()];
        let Some(winner) = present
            .iter()
            .find(|team| leading.contains(team.to_lowercase().as_str()))
        else {
            continue;
        };

        rows.push(OutcomeRow {
            winner: Some((*winner).clone()),
            status: None,
            date: query.date.map(|d| d.to_string()),
            source_url: str_field(item, "link").map(str::to_string),
            category: FactCategory::News,
            display: title.to_string(),
            ..Default::default()
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{QuestionType, Sport, Tier};
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn lakers_query() -> OutcomeQuery {
        OutcomeQuery {
            sport: Sport::Basketball,
            date: NaiveDate::from_ymd_opt(2025, 1, 15),
            teams: vec!["lakers".into(), "suns".into()],
            player: None,
            competition: None,
            matchday: None,
            question_type: QuestionType::DidResultHappen,
            raw_text: "did lakers beat suns".into(),
        }
    }

    fn envelope(provider: &str, payload: Value) -> ProviderResponse {
        ProviderResponse {
            provider: provider.into(),
            tier: Tier::Aggregator,
            weight: 0.15,
            collected_at: Utc::now(),
            payload,
            meta: Default::default(),
        }
    }

    #[test]
    fn test_sportsdb_winner_from_scores() {
        let payload = json!({
            "events": [{
                "strHomeTeam": "Lakers",
                "strAwayTeam": "Suns",
                "intHomeScore": "112",
                "intAwayScore": "108",
                "dateEvent": "2025-01-15",
                "strStatus": "FT"
            }]
        });
        let facts = normalize_outcome(&envelope("THESPORTSDB", payload), &lakers_query());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].winner.as_deref(), Some("Lakers"));
        assert!(facts[0].canonical_key.starts_with("winner:lakers:"));
        assert!(facts[0].is_final());
    }

    #[test]
    fn test_sportsdb_filters_wrong_date() {
        let payload = json!({
            "events": [{
                "strHomeTeam": "Lakers",
                "strAwayTeam": "Suns",
                "intHomeScore": 99,
                "intAwayScore": 101,
                "dateEvent": "2025-01-10"
            }]
        });
        let facts = normalize_outcome(&envelope("THESPORTSDB", payload), &lakers_query());
        assert!(facts.is_empty());
    }

    #[test]
    fn test_sportsdb_filters_wrong_teams() {
        let payload = json!({
            "events": [{
                "strHomeTeam": "Celtics",
                "strAwayTeam": "Knicks",
                "intHomeScore": 99,
                "intAwayScore": 101,
                "dateEvent": "2025-01-15"
            }]
        });
        let facts = normalize_outcome(&envelope("THESPORTSDB", payload), &lakers_query());
        assert!(facts.is_empty());
    }

    #[test]
    fn test_api_sports_winner_flag_beats_scores() {
        let payload = json!({
            "response": [{
                "fixture": {"date": "2025-01-15T03:00:00Z", "status": {"short": "FT"}},
                "teams": {
                    "home": {"name": "Los Angeles Lakers", "winner": false},
                    "away": {"name": "Phoenix Suns", "winner": true}
                },
                "goals": {"home": 1, "away": 1}
            }]
        });
        let facts = normalize_outcome(&envelope("API_BASKETBALL", payload), &lakers_query());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].winner.as_deref(), Some("Phoenix Suns"));
    }

    #[test]
    fn test_api_sports_score_preference() {
        let item = json!({
            "score": {
                "fulltime": {"home": 2, "away": 1},
                "final": {"home": 3, "away": 1}
            },
            "goals": {"home": 4, "away": 1}
        });
        assert_eq!(api_sports_scores(&item), (Some(2), Some(1)));

        let basketball = json!({
            "scores": {"home": {"total": 112}, "away": {"total": 108}}
        });
        assert_eq!(api_sports_scores(&basketball), (Some(112), Some(108)));
    }

    #[test]
    fn test_odds_api_alignment_and_completed() {
        let payload = json!([{
            "home_team": "Los Angeles Lakers",
            "away_team": "Phoenix Suns",
            "commence_time": "2025-01-15T02:00:00Z",
            "completed": true,
            "scores": [
                {"name": "Phoenix Suns", "score": "108"},
                {"name": "Los Angeles Lakers", "score": "112"}
            ]
        }]);
        let facts = normalize_outcome(&envelope("THE_ODDS_API", payload), &lakers_query());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].home_score, Some(112));
        assert_eq!(facts[0].away_score, Some(108));
        assert_eq!(facts[0].status.as_deref(), Some("finished"));
        assert_eq!(facts[0].winner.as_deref(), Some("Los Angeles Lakers"));
    }

    #[test]
    fn test_rss_title_extraction() {
        let payload = json!({
            "items": [
                {"title": "Lakers edges Suns in thriller", "link": "https://example.com/1"},
                {"title": "Warriors beat Kings comfortably", "link": "https://example.com/2"},
                {"title": "Lakers and Suns fans clash", "link": "https://example.com/3"}
            ]
        });
        let facts = normalize_outcome(&envelope("rss:espn", payload), &lakers_query());
        // Second title lacks the configured teams, third lacks a verb-led
        // winner phrase.
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].winner.as_deref(), Some("lakers"));
        assert_eq!(facts[0].category, FactCategory::News);
        assert_eq!(facts[0].reliability, 0.6);
    }

    #[test]
    fn test_row_without_key_is_discarded() {
        let payload = json!({
            "events": [{
                "strHomeTeam": "Lakers",
                "strAwayTeam": "Suns",
                "dateEvent": "2025-01-15"
            }]
        });
        let facts = normalize_outcome(&envelope("THESPORTSDB", payload), &lakers_query());
        assert!(facts.is_empty());
    }

    #[test]
    fn test_reliability_table() {
        assert_eq!(provider_reliability("API_FOOTBALL"), 0.9);
        assert_eq!(provider_reliability("rss:espn"), 0.6);
        assert_eq!(provider_reliability("rss:smallblog"), 0.55);
        assert_eq!(provider_reliability("SOMETHING_NEW"), 0.5);
    }
}
