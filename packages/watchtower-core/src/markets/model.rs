//! Weighted-factor scenario model.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Points of probability per point of factor score away from neutral, at weight 1.
const SCORE_SCALE: f64 = 0.4;
const NEUTRAL_SCORE: f64 = 50.0;
const MIN_PROBABILITY: f64 = 1.0;
const MAX_PROBABILITY: f64 = 95.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Factor {
    pub name: String,
    /// 0-100, 50 is neutral
    pub current_score: f64,
    pub weight: f64,
}

/// Baseline and driving factors for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioFactors {
    pub baseline_probability: f64,
    #[serde(default)]
    pub factors: Vec<Factor>,
}

impl ScenarioFactors {
    /// Baseline shifted by each factor's weighted distance from neutral,
    /// clamped to [1, 95] and rounded to a whole percent.
    pub fn model_probability(&self) -> f64 {
        let adjustment: f64 = self
            .factors
            .iter()
            .map(|f| (f.current_score - NEUTRAL_SCORE) * SCORE_SCALE * f.weight)
            .sum();

        (self.baseline_probability + adjustment)
            .clamp(MIN_PROBABILITY, MAX_PROBABILITY)
            .round()
    }
}

/// Factor document for every tracked scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RiskFactors {
    pub scenarios: BTreeMap<String, ScenarioFactors>,
}

impl RiskFactors {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Model probability per scenario, in scenario-name order.
    pub fn model_probabilities(&self) -> Vec<(String, f64)> {
        self.scenarios
            .iter()
            .map(|(name, factors)| (name.clone(), factors.model_probability()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(score: f64, weight: f64) -> Factor {
        Factor {
            name: "f".to_string(),
            current_score: score,
            weight,
        }
    }

    #[test]
    fn test_neutral_factors_keep_baseline() {
        let s = ScenarioFactors {
            baseline_probability: 42.0,
            factors: vec![factor(50.0, 0.5), factor(50.0, 0.5)],
        };
        assert_eq!(s.model_probability(), 42.0);
    }

    #[test]
    fn test_weighted_adjustment() {
        // (80-50)*0.4*0.5 + (30-50)*0.4*0.25 = 6 - 2
        let s = ScenarioFactors {
            baseline_probability: 20.0,
            factors: vec![factor(80.0, 0.5), factor(30.0, 0.25)],
        };
        assert_eq!(s.model_probability(), 24.0);
    }

    #[test]
    fn test_clamped() {
        let high = ScenarioFactors {
            baseline_probability: 90.0,
            factors: vec![factor(100.0, 1.0)],
        };
        let low = ScenarioFactors {
            baseline_probability: 5.0,
            factors: vec![factor(0.0, 1.0)],
        };
        assert_eq!(high.model_probability(), 95.0);
        assert_eq!(low.model_probability(), 1.0);
    }

    #[test]
    fn test_document_parses() {
        let json = r#"{
            "scenarios": {
                "China-Taiwan 2026": {
                    "baselineProbability": 15,
                    "factors": [{"name": "Military exercises", "currentScore": 60, "weight": 0.5}]
                }
            }
        }"#;
        let doc: RiskFactors = serde_json::from_str(json).unwrap();
        assert_eq!(
            doc.model_probabilities(),
            vec![("China-Taiwan 2026".to_string(), 17.0)]
        );
    }
}
