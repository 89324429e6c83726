//! Statistic-type synonym table
//!
//! One closed table shared by the classifier (phrase containment over the
//! query text) and the payload walker (key matching inside provider JSON).
//! Order matters: more specific phrases come first so "shots on target"
//! wins over "shots" and "time of possession" over "possession".

use arbiter_core::{text::normalize_name, StatisticType};

/// Synonyms per statistic type, most specific first.
pub const STATISTIC_SYNONYMS: &[(&[&str], StatisticType)] = &[
    (
        &["shots on target", "shots on goal"],
        StatisticType::ShotsOnTarget,
    ),
    (&["total shots"], StatisticType::ShotsTotal),
    (
        &["yellow cards", "yellow card", "bookings"],
        StatisticType::YellowCards,
    ),
    (
        &["red cards", "red card", "sendings off"],
        StatisticType::RedCards,
    ),
    (&["total cards", "cards"], StatisticType::TotalCards),
    (&["corner kicks", "corners"], StatisticType::Corners),
    (
        &["pass accuracy", "passing accuracy", "pass completion"],
        StatisticType::PassAccuracy,
    ),
    (&["key passes"], StatisticType::KeyPasses),
    (&["passes completed", "passes"], StatisticType::Passes),
    (&["time of possession"], StatisticType::TimeOfPossession),
    (&["possession", "ball possession"], StatisticType::Possession),
    (&["technical fouls"], StatisticType::TechnicalFouls),
    (&["flagrant fouls"], StatisticType::FlagrantFouls),
    (&["fouls"], StatisticType::Fouls),
    (&["saves"], StatisticType::Saves),
    (&["tackles"], StatisticType::Tackles),
    (&["interceptions"], StatisticType::Interceptions),
    (&["free kicks"], StatisticType::FreeKicks),
    (&["penalties awarded"], StatisticType::PenaltiesAwarded),
    (
        &["penalties scored", "penalties converted"],
        StatisticType::PenaltiesScored,
    ),
    (&["penalty yards"], StatisticType::PenaltyYards),
    (&["turnovers"], StatisticType::Turnovers),
    (&["offensive rebounds"], StatisticType::ReboundsOffensive),
    (&["defensive rebounds"], StatisticType::ReboundsDefensive),
    (&["total rebounds", "rebounds"], StatisticType::ReboundsTotal),
    (&["blocked shots", "blocks"], StatisticType::Blocks),
    (&["steals"], StatisticType::Steals),
    (
        &["three pointers attempted", "3-pointers attempted", "threes attempted"],
        StatisticType::ThreePointersAttempted,
    ),
    (
        &["three pointers made", "3-pointers made", "threes made", "three pointers"],
        StatisticType::ThreePointersMade,
    ),
    (
        &["free throws attempted"],
        StatisticType::FreeThrowsAttempted,
    ),
    (
        &["free throws made", "free throws"],
        StatisticType::FreeThrowsMade,
    ),
    (&["minutes played"], StatisticType::MinutesPlayed),
    (&["penalties"], StatisticType::Penalties),
    (&["fumbles"], StatisticType::Fumbles),
    (&["sacks"], StatisticType::Sacks),
    (
        &["third down conversions"],
        StatisticType::ThirdDownConversions,
    ),
    (&["red zone efficiency"], StatisticType::RedZoneEfficiency),
    (&["goals scored", "goals"], StatisticType::Goals),
    (&["assists"], StatisticType::Assists),
    (&["shots"], StatisticType::ShotsTotal),
];

/// First synonym contained in the (lowercased) text wins.
pub fn match_statistic_phrase(text: &str) -> Option<StatisticType> {
    let text = text.to_lowercase();
    for (synonyms, statistic_type) in STATISTIC_SYNONYMS {
        if synonyms.iter().any(|s| text.contains(s)) {
            return Some(*statistic_type);
        }
    }
    None
}

/// Exact match of a JSON key against the table, ignoring case, spacing and
/// punctuation ("yellowCards", "yellow_cards" and "Yellow Cards" all hit).
pub fn match_statistic_key(key: &str) -> Option<StatisticType> {
    let normalized = normalize_name(key);
    if normalized.is_empty() {
        return None;
    }
    for (synonyms, statistic_type) in STATISTIC_SYNONYMS {
        // The wire name itself is a valid key too.
        if normalize_name(statistic_type.as_str()) == normalized
            || synonyms.iter().any(|s| normalize_name(s) == normalized)
        {
            return Some(*statistic_type);
        }
    }
    None
}
