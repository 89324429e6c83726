//! Query classifier
//!
//! Converts free-form question text into exactly one structured shape:
//! statistic classification is tried first (it needs a statistic synonym to
//! fire), outcome classification is the fallback. The classifier is pure
//! and idempotent: re-classifying the `raw_text` it stores yields the same
//! shape.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use arbiter_core::{
    text::normalize_name, Aggregation, ClassifiedQuery, Comparator, MatchEntities, OutcomeQuery,
    Period, QueryEntities, QuestionType, Sport, StatisticQuery, StatisticQueryType,
};

use crate::synonyms::match_statistic_phrase;

const BASKETBALL_KEYWORDS: &[&str] = &[
    "nba",
    "basketball",
    "lakers",
    "suns",
    "celtics",
    "warriors",
    "bucks",
    "knicks",
    "heat",
    "bulls",
    "nets",
    "clippers",
    "mavericks",
    "nuggets",
    "rockets",
    "raptors",
    "sixers",
    "76ers",
    "free throw",
    "three pointer",
    "rebound",
];

const SOCCER_KEYWORDS: &[&str] = &[
    "soccer",
    "premier league",
    "la liga",
    "serie a",
    "bundesliga",
    "champions league",
    "world cup",
    "uefa",
    "fifa",
    "mls",
    "arsenal",
    "chelsea",
    "liverpool",
    "tottenham",
    "manchester united",
    "manchester city",
    "real madrid",
    "barcelona",
    "atletico madrid",
    "bayern munich",
    "borussia dortmund",
    "juventus",
    "inter milan",
    "ac milan",
    "psg",
    "paris saint-germain",
];

/// Fixed team keyword set for outcome-query team extraction.
const TEAM_KEYWORDS: &[&str] = &[
    "lakers",
    "suns",
    "celtics",
    "warriors",
    "bucks",
    "knicks",
    "heat",
    "bulls",
    "nets",
    "clippers",
    "mavericks",
    "nuggets",
    "rockets",
    "raptors",
    "sixers",
    "arsenal",
    "chelsea",
    "liverpool",
    "tottenham",
    "manchester united",
    "manchester city",
    "real madrid",
    "barcelona",
    "atletico madrid",
    "bayern munich",
    "borussia dortmund",
    "juventus",
    "inter milan",
    "ac milan",
    "psg",
];

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("sept", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

macro_rules! static_regex {
    ($pattern:expr) => {{
        static CELL: OnceLock<Regex> = OnceLock::new();
        regex(&CELL, $pattern)
    }};
}

/// Classify raw text into at most one structured shape.
///
/// Returns `None` only when the text is empty after whitespace
/// normalization; anything else classifies (the outcome path always
/// applies as a fallback).
pub fn classify(raw: &str) -> Option<ClassifiedQuery> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    let lower = text.to_lowercase();
    let sport = detect_sport(&lower);
    let date = detect_date(&text);
    let teams = detect_teams(&lower);

    if let Some(stat) = classify_statistic(&text, &lower, date) {
        debug!(
            "classified statistic query: type={:?} query_type={:?}",
            stat.statistic_type, stat.query_type
        );
        return Some(ClassifiedQuery::Statistic(stat));
    }

    let outcome = classify_outcome(&text, &lower, sport, date, teams);
    debug!("classified outcome query: {:?}", outcome.question_type);
    Some(ClassifiedQuery::Outcome(outcome))
}

fn detect_sport(lower: &str) -> Sport {
    if BASKETBALL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Sport::Basketball
    } else if SOCCER_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Sport::Soccer
    } else {
        Sport::General
    }
}

/// Detect a date with priority ISO > "Month D, YYYY" > numeric M/D/YY(YY),
/// month-first preferred and day-first as fallback.
fn detect_date(text: &str) -> Option<NaiveDate> {
    let iso = static_regex!(r"\b(\d{4})-(\d{2})-(\d{2})\b");
    if let Some(caps) = iso.captures(text) {
        let (y, m, d) = (
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            return Some(date);
        }
    }

    let verbal = static_regex!(r"(?i)\b([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b");
    for caps in verbal.captures_iter(text) {
        let month_name = caps[1].to_lowercase();
        if let Some((_, month)) = MONTHS.iter().find(|(name, _)| *name == month_name) {
            let day: u32 = caps[2].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            if let Some(date) = NaiveDate::from_ymd_opt(year, *month, day) {
                return Some(date);
            }
        }
    }

    let numeric = static_regex!(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b");
    if let Some(caps) = numeric.captures(text) {
        let a: u32 = caps[1].parse().ok()?;
        let b: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 100 {
            year += 2000;
        }
        // Month-first preferred, day-first as fallback.
        if let Some(date) = NaiveDate::from_ymd_opt(year, a, b) {
            return Some(date);
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, b, a) {
            return Some(date);
        }
    }

    None
}

/// Teams from the fixed keyword set, in order of first appearance.
fn detect_teams(lower: &str) -> Vec<String> {
    let mut hits: Vec<(usize, String)> = TEAM_KEYWORDS
        .iter()
        .filter_map(|team| lower.find(team).map(|idx| (idx, team.to_string())))
        .collect();
    hits.sort_by_key(|(idx, _)| *idx);
    hits.into_iter().map(|(_, team)| team).take(4).collect()
}

fn classify_statistic(
    text: &str,
    lower: &str,
    date: Option<NaiveDate>,
) -> Option<StatisticQuery> {
    let statistic_type = match_statistic_phrase(lower)?;

    let match_info = extract_match_entities(text, date);
    let player = extract_player(text, &match_info);
    let team = single_team(lower, &match_info);

    let aggregation = if lower.contains("per team") {
        Aggregation::PerTeam
    } else if lower.contains("per player") {
        Aggregation::PerPlayer
    } else if lower.contains("average") {
        Aggregation::Average
    } else if lower.contains("difference") {
        Aggregation::Difference
    } else {
        Aggregation::Total
    };

    let period = if lower.contains("first half") || lower.contains("1st half") {
        Period::FirstHalf
    } else if lower.contains("second half") || lower.contains("2nd half") {
        Period::SecondHalf
    } else if lower.contains("extra time") {
        Period::ExtraTime
    } else if lower.contains("overtime") {
        Period::Overtime
    } else if lower.contains("quarter") {
        Period::Quarter
    } else {
        Period::FullTime
    };

    let (threshold, comparator) = extract_threshold(lower);

    let query_type = if threshold.is_some() {
        StatisticQueryType::Threshold
    } else if player.is_some() {
        StatisticQueryType::PlayerStatistic
    } else if team.is_some() || statistic_type == arbiter_core::StatisticType::TotalCards {
        StatisticQueryType::TeamAggregate
    } else {
        StatisticQueryType::MatchStatistic
    };

    let event_end_time = date.and_then(end_of_day_utc);
    let can_resolve_now = StatisticQuery::resolvable_at(event_end_time, Utc::now());

    Some(StatisticQuery {
        query_type,
        statistic_type,
        entities: QueryEntities {
            match_info,
            team,
            player,
        },
        aggregation,
        period,
        threshold,
        comparator,
        event_end_time,
        can_resolve_now,
        raw_text: text.to_string(),
    })
}

/// A match played on day D is treated as ending at the end of D (UTC);
/// resolvability only needs "at least 15 minutes in the past".
fn end_of_day_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(23, 59, 59)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn extract_match_entities(text: &str, date: Option<NaiveDate>) -> Option<MatchEntities> {
    let versus = static_regex!(
        r"([A-Z][\w.'-]*(?:\s+[A-Z][\w.'-]*)*)\s+(?:vs\.?|versus|against)\s+([A-Z][\w.'-]*(?:\s+[A-Z][\w.'-]*)*)"
    );
    let caps = versus.captures(text)?;
    Some(MatchEntities {
        home: Some(caps[1].trim().to_string()),
        away: Some(caps[2].trim().to_string()),
        date,
        competition: None,
        id: None,
    })
}

/// Player candidate from `did <Proper>` or `by/from/for <Proper>`; a hit
/// that is one of the match teams is not a player.
fn extract_player(text: &str, match_info: &Option<MatchEntities>) -> Option<String> {
    let pattern =
        static_regex!(r"\b(?:did|by|from|for)\s+([A-Z][a-z'-]+(?:\s+[A-Z][a-z'-]+)*)");
    let caps = pattern.captures(text)?;
    let candidate = caps[1].trim().to_string();

    let is_team = match_info
        .as_ref()
        .map(|m| {
            [m.home.as_deref(), m.away.as_deref()]
                .into_iter()
                .flatten()
                .any(|t| normalize_name(t) == normalize_name(&candidate))
        })
        .unwrap_or(false);
    let is_known_team = TEAM_KEYWORDS
        .iter()
        .any(|t| normalize_name(t) == normalize_name(&candidate));

    if is_team || is_known_team {
        None
    } else {
        Some(candidate)
    }
}

/// The team entity is only set when exactly one configured team appears and
/// the text has no home/away pair.
fn single_team(lower: &str, match_info: &Option<MatchEntities>) -> Option<String> {
    if match_info.is_some() {
        return None;
    }
    let teams = detect_teams(lower);
    if teams.len() == 1 {
        teams.into_iter().next()
    } else {
        None
    }
}

/// Threshold patterns, first match in priority order wins.
fn extract_threshold(lower: &str) -> (Option<f64>, Option<Comparator>) {
    let number = r"(\d+(?:\.\d+)?)";
    let patterns: [(&str, Comparator); 9] = [
        (r"\bover\s+N\b", Comparator::Over),
        (r"\bunder\s+N\b", Comparator::Under),
        (r"\bmore\s+than\s+N\b", Comparator::Over),
        (r"\bless\s+than\s+N\b", Comparator::Under),
        (r"\bat\s+least\s+N\b", Comparator::AtLeast),
        (r"\bat\s+most\s+N\b", Comparator::AtMost),
        (r"\bN\+\s*(?:line|cards|corners)\b", Comparator::AtLeast),
        (r"(?:>=|≥)\s*N\b", Comparator::AtLeast),
        (r"(?:<=|≤)\s*N\b", Comparator::AtMost),
    ];

    for (template, comparator) in patterns {
        let pattern = template.replace('N', number);
        if let Some(caps) = Regex::new(&pattern)
            .ok()
            .and_then(|re| re.captures(lower))
        {
            if let Ok(value) = caps[1].parse::<f64>() {
                return (Some(value), Some(comparator));
            }
        }
    }
    (None, None)
}

fn classify_outcome(
    text: &str,
    lower: &str,
    sport: Sport,
    date: Option<NaiveDate>,
    teams: Vec<String>,
) -> OutcomeQuery {
    let did_pattern =
        static_regex!(r"\bdid\b.*\b(win|lose|draw|tie|happen|beat|defeat)\b");
    let who_won = static_regex!(r"\b(who won|winner|victor)\b");
    let scoreline = static_regex!(r"\b(scoreline|final score|score|points)\b");
    let award = static_regex!(r"\b(mvp|award|player of the match|golden boot|top scorer)\b");

    let mut question_type = if did_pattern.is_match(lower) {
        QuestionType::DidResultHappen
    } else if who_won.is_match(lower) {
        QuestionType::WhoWon
    } else if scoreline.is_match(lower) {
        QuestionType::Scoreline
    } else if award.is_match(lower) {
        QuestionType::PlayerAward
    } else {
        QuestionType::Other
    };

    // did_result_happen needs a subject team to compare the winner against.
    if question_type == QuestionType::DidResultHappen && teams.is_empty() {
        question_type = QuestionType::Other;
    }

    let player = extract_player(text, &None);
    let matchday = static_regex!(r"\bmatchday\s+(\d{1,2})\b")
        .captures(lower)
        .and_then(|c| c[1].parse().ok());

    OutcomeQuery {
        sport,
        date,
        teams,
        player,
        competition: None,
        matchday,
        question_type,
        raw_text: text.to_string(),
    }
}
