//! Range and logical validation of normalized statistics
//!
//! Two rule families: per-type range rules (hard min/max plus a typical
//! band that only warns) and cross-statistic logical rules. Failing a range
//! marks the source invalid; everything else accumulates warnings.

use std::collections::BTreeMap;

use arbiter_core::{NormalizedStatistic, StatisticType, ValidationReport};

/// Per-type bounds. Values outside `[min, max]` are invalid; values outside
/// `typical` draw an "Unusual value" warning.
#[derive(Debug, Clone, Copy)]
pub struct RangeRule {
    pub min: f64,
    pub max: f64,
    pub typical: (f64, f64),
}

/// Range table for the statistic types with meaningful bounds.
pub fn range_rule(statistic_type: StatisticType) -> Option<RangeRule> {
    use StatisticType::*;
    let rule = match statistic_type {
        YellowCards => RangeRule {
            min: 0.0,
            max: 15.0,
            typical: (0.0, 8.0),
        },
        RedCards => RangeRule {
            min: 0.0,
            max: 5.0,
            typical: (0.0, 2.0),
        },
        TotalCards => RangeRule {
            min: 0.0,
            max: 20.0,
            typical: (0.0, 10.0),
        },
        Corners => RangeRule {
            min: 0.0,
            max: 30.0,
            typical: (2.0, 16.0),
        },
        ShotsOnTarget => RangeRule {
            min: 0.0,
            max: 30.0,
            typical: (1.0, 15.0),
        },
        ShotsTotal => RangeRule {
            min: 0.0,
            max: 60.0,
            typical: (5.0, 35.0),
        },
        Fouls => RangeRule {
            min: 0.0,
            max: 50.0,
            typical: (10.0, 30.0),
        },
        Possession | PassAccuracy | RedZoneEfficiency | TimeOfPossession => RangeRule {
            min: 0.0,
            max: 100.0,
            typical: (20.0, 80.0),
        },
        Passes => RangeRule {
            min: 0.0,
            max: 1500.0,
            typical: (300.0, 900.0),
        },
        Goals => RangeRule {
            min: 0.0,
            max: 15.0,
            typical: (0.0, 6.0),
        },
        Saves => RangeRule {
            min: 0.0,
            max: 25.0,
            typical: (0.0, 10.0),
        },
        ReboundsTotal => RangeRule {
            min: 0.0,
            max: 80.0,
            typical: (30.0, 60.0),
        },
        Turnovers => RangeRule {
            min: 0.0,
            max: 40.0,
            typical: (5.0, 22.0),
        },
        MinutesPlayed => RangeRule {
            min: 0.0,
            max: 60.0,
            typical: (0.0, 48.0),
        },
        PenaltyYards => RangeRule {
            min: 0.0,
            max: 250.0,
            typical: (20.0, 120.0),
        },
        _ => return None,
    };
    Some(rule)
}

/// Validate a batch of normalized statistics.
pub fn validate(statistics: &[NormalizedStatistic]) -> ValidationReport {
    let mut report = ValidationReport {
        within_range: true,
        logically_consistent: true,
        warnings: Vec::new(),
        invalid_sources: Vec::new(),
    };

    for stat in statistics {
        let Some(rule) = range_rule(stat.statistic_type) else {
            continue;
        };
        if stat.value < rule.min || stat.value > rule.max {
            report.within_range = false;
            for source in &stat.sources {
                if !report.invalid_sources.contains(&source.source) {
                    report.invalid_sources.push(source.source.clone());
                }
            }
            report.warnings.push(format!(
                "Out of range: {} = {} (allowed {}..{})",
                stat.statistic_type.as_str(),
                stat.value,
                rule.min,
                rule.max
            ));
        } else if stat.value < rule.typical.0 || stat.value > rule.typical.1 {
            report.warnings.push(format!(
                "Unusual value: {} = {} (typical {}..{})",
                stat.statistic_type.as_str(),
                stat.value,
                rule.typical.0,
                rule.typical.1
            ));
        }
    }

    check_logical_rules(statistics, &mut report);
    report
}

/// Representative value per type: the mean of observed values.
fn mean_by_type(statistics: &[NormalizedStatistic]) -> BTreeMap<&'static str, f64> {
    let mut sums: BTreeMap<&'static str, (f64, usize)> = BTreeMap::new();
    for stat in statistics {
        let entry = sums.entry(stat.statistic_type.as_str()).or_insert((0.0, 0));
        entry.0 += stat.value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect()
}

fn check_logical_rules(statistics: &[NormalizedStatistic], report: &mut ValidationReport) {
    let means = mean_by_type(statistics);

    if let (Some(on_target), Some(total)) = (means.get("shots_on_target"), means.get("shots_total"))
    {
        if on_target > total {
            report.logically_consistent = false;
            report.warnings.push(format!(
                "Inconsistent: shots_on_target {} exceeds shots_total {}",
                on_target, total
            ));
        }
    }

    if let (Some(goals), Some(on_target)) = (means.get("goals"), means.get("shots_on_target")) {
        if goals > on_target {
            report.logically_consistent = false;
            report.warnings.push(format!(
                "Inconsistent: goals {} exceeds shots_on_target {}",
                goals, on_target
            ));
        }
    }

    if let (Some(yellow), Some(red), Some(total)) = (
        means.get("yellow_cards"),
        means.get("red_cards"),
        means.get("total_cards"),
    ) {
        if (yellow + red - total).abs() > f64::EPSILON {
            report.logically_consistent = false;
            report.warnings.push(format!(
                "Inconsistent: yellow {} + red {} != total {}",
                yellow, red, total
            ));
        }
    }

    let possession: Vec<f64> = statistics
        .iter()
        .filter(|s| s.statistic_type == StatisticType::Possession)
        .map(|s| s.value)
        .collect();
    if possession.len() == 2 {
        let sum = possession[0] + possession[1];
        if (sum - 100.0).abs() > 2.0 {
            report.logically_consistent = false;
            report.warnings.push(format!(
                "Inconsistent: possession values sum to {} (expected ~100)",
                sum
            ));
        }
    }
}
