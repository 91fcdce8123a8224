//! Prediction track record: accuracy against the market and calibration.

use crate::types::{DailyPrediction, ScenarioSnapshot};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Market probability assumed when scoring a resolved snapshot with no quote.
const UNQUOTED_MARKET: f64 = 50.0;

const BUCKET_WIDTH: f64 = 20.0;
const BUCKET_COUNT: usize = 5;

/// Track record for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioPerformance {
    pub total_predictions: usize,
    pub avg_model_probability: f64,
    /// Unquoted days count as 0
    pub avg_market_probability: f64,
    /// Mean absolute divergence
    pub avg_divergence: f64,
    pub resolved: usize,
    /// Resolved snapshots where the model was at least as close as the market
    pub correct: usize,
    pub accuracy: Option<f64>,
    pub history: Vec<ScenarioPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioPoint {
    pub date: NaiveDate,
    pub model_probability: f64,
    pub market_probability: Option<f64>,
    pub divergence: f64,
}

/// Reliability-diagram input for one model-probability band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationBucket {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    /// Share of resolved snapshots that happened, as a percent
    pub avg_outcome: f64,
    pub midpoint: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryAnalytics {
    pub total_days: usize,
    pub scenario_performance: BTreeMap<String, ScenarioPerformance>,
    pub overall_accuracy: Option<f64>,
    pub calibration: Vec<CalibrationBucket>,
    /// Mean absolute divergence over every snapshot
    pub average_divergence: f64,
}

/// Whether the model beat or tied the market on a resolved snapshot.
/// `None` while the snapshot is pending.
pub fn model_was_closer(snapshot: &ScenarioSnapshot) -> Option<bool> {
    let outcome = snapshot.outcome()?;
    let actual = if outcome { 100.0 } else { 0.0 };
    let market = snapshot.market_probability().unwrap_or(UNQUOTED_MARKET);

    Some((actual - snapshot.model_probability).abs() <= (actual - market).abs())
}

pub fn compute_analytics(predictions: &[DailyPrediction]) -> HistoryAnalytics {
    let mut sums: BTreeMap<String, ScenarioSums> = BTreeMap::new();
    let mut buckets = [(0usize, 0usize); BUCKET_COUNT];
    let mut divergence_total = 0.0;
    let mut snapshot_count = 0usize;

    for day in predictions {
        for (scenario, snapshot) in &day.scenarios {
            sums.entry(scenario.clone()).or_default().add(day.date, snapshot);
            divergence_total += snapshot.divergence.abs();
            snapshot_count += 1;

            if let Some(outcome) = snapshot.outcome() {
                let bucket = &mut buckets[bucket_index(snapshot.model_probability)];
                bucket.0 += 1;
                bucket.1 += usize::from(outcome);
            }
        }
    }

    let resolved: usize = sums.values().map(|s| s.resolved).sum();
    let correct: usize = sums.values().map(|s| s.correct).sum();

    HistoryAnalytics {
        total_days: predictions.len(),
        scenario_performance: sums
            .into_iter()
            .map(|(scenario, s)| (scenario, s.finish()))
            .collect(),
        overall_accuracy: percent(correct, resolved),
        calibration: buckets
            .iter()
            .enumerate()
            .map(|(i, &(count, happened))| {
                let lower = i as f64 * BUCKET_WIDTH;
                let upper = lower + BUCKET_WIDTH;
                CalibrationBucket {
                    label: format!("{}-{}", lower, upper),
                    lower,
                    upper,
                    count,
                    avg_outcome: percent(happened, count).unwrap_or(0.0),
                    midpoint: (lower + upper) / 2.0,
                }
            })
            .collect(),
        average_divergence: if snapshot_count > 0 {
            round1(divergence_total / snapshot_count as f64)
        } else {
            0.0
        },
    }
}

/// Bands are half-open except the last, which takes 100.
fn bucket_index(model_probability: f64) -> usize {
    let index = (model_probability / BUCKET_WIDTH).floor();
    if index <= 0.0 {
        0
    } else {
        (index as usize).min(BUCKET_COUNT - 1)
    }
}

fn percent(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64 * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Default)]
struct ScenarioSums {
    count: usize,
    model: f64,
    market: f64,
    divergence: f64,
    resolved: usize,
    correct: usize,
    history: Vec<ScenarioPoint>,
}

impl ScenarioSums {
    fn add(&mut self, date: NaiveDate, snapshot: &ScenarioSnapshot) {
        self.count += 1;
        self.model += snapshot.model_probability;
        self.market += snapshot.market_probability().unwrap_or(0.0);
        self.divergence += snapshot.divergence.abs();

        if let Some(closer) = model_was_closer(snapshot) {
            self.resolved += 1;
            self.correct += usize::from(closer);
        }

        self.history.push(ScenarioPoint {
            date,
            model_probability: snapshot.model_probability,
            market_probability: snapshot.market_probability(),
            divergence: snapshot.divergence,
        });
    }

    fn finish(self) -> ScenarioPerformance {
        let n = self.count.max(1) as f64;
        ScenarioPerformance {
            total_predictions: self.count,
            avg_model_probability: round1(self.model / n),
            avg_market_probability: round1(self.market / n),
            avg_divergence: round1(self.divergence / n),
            resolved: self.resolved,
            correct: self.correct,
            accuracy: percent(self.correct, self.resolved).map(round1),
            history: self.history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
    }

    fn resolved(model: f64, market: Option<f64>, outcome: bool) -> ScenarioSnapshot {
        ScenarioSnapshot {
            resolved: true,
            actual_outcome: Some(outcome),
            ..ScenarioSnapshot::new(model, market, None)
        }
    }

    fn day(d: u32, entries: Vec<(&str, ScenarioSnapshot)>) -> DailyPrediction {
        DailyPrediction {
            date: date(d),
            scenarios: entries.into_iter().map(|(s, snap)| (s.to_string(), snap)).collect(),
        }
    }

    #[test]
    fn test_model_closer_counts_ties() {
        assert_eq!(model_was_closer(&resolved(30.0, Some(20.0), true)), Some(true));
        assert_eq!(model_was_closer(&resolved(30.0, Some(20.0), false)), Some(false));
        assert_eq!(model_was_closer(&resolved(40.0, Some(40.0), true)), Some(true));
        assert_eq!(model_was_closer(&ScenarioSnapshot::new(30.0, Some(20.0), None)), None);
    }

    #[test]
    fn test_unquoted_market_scored_at_fifty() {
        assert_eq!(model_was_closer(&resolved(45.0, None, false)), Some(true));
        assert_eq!(model_was_closer(&resolved(55.0, None, false)), Some(false));
    }

    #[test]
    fn test_resolved_without_outcome_is_pending() {
        let snap = ScenarioSnapshot {
            resolved: true,
            ..ScenarioSnapshot::new(30.0, Some(20.0), None)
        };
        let analytics = compute_analytics(&[day(1, vec![("a", snap)])]);

        assert_eq!(analytics.scenario_performance["a"].resolved, 0);
        assert!(analytics.overall_accuracy.is_none());
        assert!(analytics.calibration.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_scenario_performance() {
        let predictions = vec![
            day(1, vec![("a", ScenarioSnapshot::new(20.0, Some(10.0), None))]),
            day(2, vec![("a", resolved(30.0, None, true))]),
            day(3, vec![("a", resolved(10.0, Some(40.0), true))]),
        ];
        let analytics = compute_analytics(&predictions);
        let a = &analytics.scenario_performance["a"];

        assert_eq!(analytics.total_days, 3);
        assert_eq!(a.total_predictions, 3);
        assert_eq!(a.avg_model_probability, 20.0);
        // 10 + 0 + 40
        assert_relative_eq!(a.avg_market_probability, 16.7);
        assert_eq!(a.resolved, 2);
        assert_eq!(a.correct, 0);
        assert_eq!(a.accuracy, Some(0.0));
        assert_eq!(a.history.len(), 3);
        assert_eq!(a.history[1].market_probability, None);
        assert_eq!(analytics.overall_accuracy, Some(0.0));
    }

    #[test]
    fn test_calibration_buckets() {
        let predictions = vec![
            day(1, vec![
                ("a", resolved(15.0, Some(10.0), false)),
                ("b", resolved(20.0, Some(10.0), true)),
                ("c", resolved(100.0, Some(90.0), true)),
            ]),
            day(2, vec![
                ("a", resolved(19.9, Some(10.0), true)),
                ("b", ScenarioSnapshot::new(50.0, Some(50.0), None)),
            ]),
        ];
        let calibration = compute_analytics(&predictions).calibration;

        let labels: Vec<&str> = calibration.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["0-20", "20-40", "40-60", "60-80", "80-100"]);

        assert_eq!(calibration[0].count, 2);
        assert_relative_eq!(calibration[0].avg_outcome, 50.0);
        assert_eq!(calibration[0].midpoint, 10.0);
        assert_eq!(calibration[1].count, 1);
        assert_eq!(calibration[2].count, 0);
        assert_eq!(calibration[2].avg_outcome, 0.0);
        assert_eq!(calibration[4].count, 1);
        assert_relative_eq!(calibration[4].avg_outcome, 100.0);
    }

    #[test]
    fn test_overall_accuracy_and_divergence() {
        let predictions = vec![day(1, vec![
            ("a", resolved(80.0, Some(60.0), true)),
            ("b", resolved(10.0, Some(30.0), false)),
            ("c", resolved(50.0, Some(20.0), false)),
            ("d", ScenarioSnapshot::new(10.0, Some(12.0), None)),
        ])];
        let analytics = compute_analytics(&predictions);

        assert_relative_eq!(analytics.overall_accuracy.unwrap(), 200.0 / 3.0);
        // (20 + 20 + 30 + 2) / 4
        assert_eq!(analytics.average_divergence, 18.0);
    }

    #[test]
    fn test_empty_history() {
        let analytics = compute_analytics(&[]);
        assert_eq!(analytics.total_days, 0);
        assert!(analytics.scenario_performance.is_empty());
        assert!(analytics.overall_accuracy.is_none());
        assert_eq!(analytics.calibration.len(), 5);
        assert_eq!(analytics.average_divergence, 0.0);
    }
}
