//! Normalized statistic entities
//!
//! A `NormalizedStatistic` is one reconciled observation of a match/player
//! statistic; each carries the list of `StatisticSource`s it was derived
//! from so consensus can count distinct providers and tiers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::Tier;

/// The closed set of statistic types the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticType {
    YellowCards,
    RedCards,
    TotalCards,
    Corners,
    ShotsOnTarget,
    ShotsTotal,
    Fouls,
    Possession,
    Passes,
    PassAccuracy,
    KeyPasses,
    Saves,
    Tackles,
    Interceptions,
    FreeKicks,
    PenaltiesAwarded,
    PenaltiesScored,
    TechnicalFouls,
    FlagrantFouls,
    Turnovers,
    ReboundsOffensive,
    ReboundsDefensive,
    ReboundsTotal,
    Blocks,
    Steals,
    ThreePointersMade,
    ThreePointersAttempted,
    FreeThrowsMade,
    FreeThrowsAttempted,
    MinutesPlayed,
    Penalties,
    PenaltyYards,
    Fumbles,
    Sacks,
    TimeOfPossession,
    ThirdDownConversions,
    RedZoneEfficiency,
    Goals,
    Assists,
    Other,
}

impl StatisticType {
    /// Measurement unit for this statistic.
    pub fn unit(&self) -> Unit {
        match self {
            StatisticType::Possession
            | StatisticType::PassAccuracy
            | StatisticType::RedZoneEfficiency
            | StatisticType::TimeOfPossession => Unit::Percentage,
            StatisticType::MinutesPlayed => Unit::Minutes,
            StatisticType::PenaltyYards => Unit::Yards,
            _ => Unit::Count,
        }
    }

    /// Snake-case wire name, used in provider query strings and displays.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticType::YellowCards => "yellow_cards",
            StatisticType::RedCards => "red_cards",
            StatisticType::TotalCards => "total_cards",
            StatisticType::Corners => "corners",
            StatisticType::ShotsOnTarget => "shots_on_target",
            StatisticType::ShotsTotal => "shots_total",
            StatisticType::Fouls => "fouls",
            StatisticType::Possession => "possession",
            StatisticType::Passes => "passes",
            StatisticType::PassAccuracy => "pass_accuracy",
            StatisticType::KeyPasses => "key_passes",
            StatisticType::Saves => "saves",
            StatisticType::Tackles => "tackles",
            StatisticType::Interceptions => "interceptions",
            StatisticType::FreeKicks => "free_kicks",
            StatisticType::PenaltiesAwarded => "penalties_awarded",
            StatisticType::PenaltiesScored => "penalties_scored",
            StatisticType::TechnicalFouls => "technical_fouls",
            StatisticType::FlagrantFouls => "flagrant_fouls",
            StatisticType::Turnovers => "turnovers",
            StatisticType::ReboundsOffensive => "rebounds_offensive",
            StatisticType::ReboundsDefensive => "rebounds_defensive",
            StatisticType::ReboundsTotal => "rebounds_total",
            StatisticType::Blocks => "blocks",
            StatisticType::Steals => "steals",
            StatisticType::ThreePointersMade => "three_pointers_made",
            StatisticType::ThreePointersAttempted => "three_pointers_attempted",
            StatisticType::FreeThrowsMade => "free_throws_made",
            StatisticType::FreeThrowsAttempted => "free_throws_attempted",
            StatisticType::MinutesPlayed => "minutes_played",
            StatisticType::Penalties => "penalties",
            StatisticType::PenaltyYards => "penalty_yards",
            StatisticType::Fumbles => "fumbles",
            StatisticType::Sacks => "sacks",
            StatisticType::TimeOfPossession => "time_of_possession",
            StatisticType::ThirdDownConversions => "third_down_conversions",
            StatisticType::RedZoneEfficiency => "red_zone_efficiency",
            StatisticType::Goals => "goals",
            StatisticType::Assists => "assists",
            StatisticType::Other => "other",
        }
    }
}

/// Measurement unit of a statistic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Count,
    Percentage,
    Minutes,
    Yards,
    Other,
}

impl Unit {
    /// Agreement tolerance: two values within this distance of each other
    /// are considered to agree.
    pub fn tolerance(&self) -> f64 {
        match self {
            Unit::Percentage => 4.0,
            _ => 1.0,
        }
    }

    /// Display suffix appended to resolved values.
    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::Percentage => "%",
            _ => "",
        }
    }
}

/// How a statistic is aggregated across entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Total,
    PerTeam,
    PerPlayer,
    Average,
    Difference,
}

/// Which phase of the match a statistic covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    FullTime,
    FirstHalf,
    SecondHalf,
    ExtraTime,
    Overtime,
    Quarter,
}

impl Period {
    /// Snake-case wire name used in provider query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::FullTime => "full_time",
            Period::FirstHalf => "first_half",
            Period::SecondHalf => "second_half",
            Period::ExtraTime => "extra_time",
            Period::Overtime => "overtime",
            Period::Quarter => "quarter",
        }
    }
}

/// One provider's raw observation of a statistic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticSource {
    pub source: String,
    pub tier: Tier,
    pub weight: f64,
    pub raw_value: String,
    pub parsed_value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A reconciled statistic observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedStatistic {
    pub statistic_type: StatisticType,
    pub team: Option<String>,
    pub player: Option<String>,
    /// Key of the match this statistic belongs to, when known.
    pub match_key: Option<String>,
    pub value: f64,
    pub unit: Unit,
    pub period: Period,
    pub aggregation: Aggregation,
    pub sources: Vec<StatisticSource>,
}
