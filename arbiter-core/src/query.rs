//! Classified query shapes
//!
//! The classifier reduces free-form text to exactly one of two structured
//! shapes: an `OutcomeQuery` (who won / did it happen / scoreline / award)
//! or a `StatisticQuery` (match, player or team statistic, possibly with a
//! threshold to evaluate).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::statistic::{Aggregation, Period, StatisticType};

/// Minimum age of an event end before a statistic query is resolvable.
pub const RESOLVABLE_AFTER_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Basketball,
    Soccer,
    #[default]
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    DidResultHappen,
    WhoWon,
    PlayerAward,
    Scoreline,
    Other,
}

/// Structured outcome question.
///
/// Invariant: `question_type == DidResultHappen` implies `teams` is
/// non-empty (the classifier downgrades to `Other` otherwise).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeQuery {
    pub sport: Sport,
    pub date: Option<NaiveDate>,
    /// 0 to 4 team names, in the order they appeared in the text.
    pub teams: Vec<String>,
    pub player: Option<String>,
    pub competition: Option<String>,
    pub matchday: Option<u32>,
    pub question_type: QuestionType,
    pub raw_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticQueryType {
    MatchStatistic,
    PlayerStatistic,
    TeamAggregate,
    Threshold,
}

/// Threshold comparator. `Over` is strict, `AtLeast` inclusive, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    #[serde(rename = ">")]
    Over,
    #[serde(rename = ">=")]
    AtLeast,
    #[serde(rename = "<")]
    Under,
    #[serde(rename = "<=")]
    AtMost,
    #[serde(rename = "=")]
    Equal,
}

impl Comparator {
    /// Evaluate `value <op> threshold`.
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Over => value > threshold,
            Comparator::AtLeast => value >= threshold,
            Comparator::Under => value < threshold,
            Comparator::AtMost => value <= threshold,
            Comparator::Equal => (value - threshold).abs() < f64::EPSILON,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Over => ">",
            Comparator::AtLeast => ">=",
            Comparator::Under => "<",
            Comparator::AtMost => "<=",
            Comparator::Equal => "=",
        }
    }
}

/// The match a statistic question is about, as far as the text revealed it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatchEntities {
    pub home: Option<String>,
    pub away: Option<String>,
    pub date: Option<NaiveDate>,
    pub competition: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryEntities {
    #[serde(rename = "match")]
    pub match_info: Option<MatchEntities>,
    pub team: Option<String>,
    pub player: Option<String>,
}

/// Structured statistic question.
///
/// Invariant: `threshold` and `comparator` are both present iff
/// `query_type == Threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticQuery {
    pub query_type: StatisticQueryType,
    pub statistic_type: StatisticType,
    pub entities: QueryEntities,
    pub aggregation: Aggregation,
    pub period: Period,
    pub threshold: Option<f64>,
    pub comparator: Option<Comparator>,
    pub event_end_time: Option<DateTime<Utc>>,
    pub can_resolve_now: bool,
    pub raw_text: String,
}

impl StatisticQuery {
    /// A statistic query is resolvable iff the event ended at least
    /// `RESOLVABLE_AFTER_MINUTES` ago.
    pub fn resolvable_at(event_end_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match event_end_time {
            Some(end) => now - end >= chrono::Duration::minutes(RESOLVABLE_AFTER_MINUTES),
            None => false,
        }
    }
}

/// Exactly one structured shape per raw query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedQuery {
    Outcome(OutcomeQuery),
    Statistic(StatisticQuery),
}

impl ClassifiedQuery {
    pub fn raw_text(&self) -> &str {
        match self {
            ClassifiedQuery::Outcome(q) => &q.raw_text,
            ClassifiedQuery::Statistic(q) => &q.raw_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_comparator_semantics() {
        assert!(Comparator::Over.evaluate(9.0, 8.0));
        assert!(!Comparator::Over.evaluate(8.0, 8.0));
        assert!(Comparator::AtLeast.evaluate(8.0, 8.0));
        assert!(Comparator::Under.evaluate(7.0, 8.0));
        assert!(!Comparator::Under.evaluate(8.0, 8.0));
        assert!(Comparator::AtMost.evaluate(8.0, 8.0));
        assert!(Comparator::Equal.evaluate(4.0, 4.0));
        assert!(!Comparator::Equal.evaluate(4.0, 5.0));
    }

    #[test]
    fn test_resolvability_window() {
        let now = Utc::now();
        assert!(StatisticQuery::resolvable_at(
            Some(now - Duration::minutes(16)),
            now
        ));
        assert!(StatisticQuery::resolvable_at(
            Some(now - Duration::minutes(15)),
            now
        ));
        assert!(!StatisticQuery::resolvable_at(
            Some(now - Duration::minutes(14)),
            now
        ));
        assert!(!StatisticQuery::resolvable_at(None, now));
    }
}
