//! Position health scoring and action review.
//!
//! The score is a deterministic deduction model starting at 100:
//!
//! | Factor | Max deduction |
//! |---|---|
//! | Stop-loss proximity | 40 |
//! | Profitability | 30 (or +5 bonus) |
//! | Thesis validity | 20 |
//! | Futures roll urgency | 10 |

use crate::types::Position;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const BROKEN_THESIS: [&str; 3] = ["wrong", "invalidated", "thesis broken"];
const WEAK_THESIS: [&str; 2] = ["thesis weakening", "reconsidering"];

/// Categorical health band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStatus {
    Excellent,
    Good,
    Caution,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => HealthStatus::Excellent,
            60..=79 => HealthStatus::Good,
            40..=59 => HealthStatus::Caution,
            20..=39 => HealthStatus::Warning,
            _ => HealthStatus::Critical,
        }
    }
}

/// Health score of one position with the deduction behind each factor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionHealth {
    pub position_id: String,
    pub score: u8,
    pub status: HealthStatus,
    pub stop_loss_penalty: i32,
    /// Negative for a deduction, positive for the winner bonus
    pub profitability_adjustment: i32,
    pub thesis_penalty: i32,
    pub roll_penalty: i32,
}

/// Distance from price to stop as a percent of price.
fn stop_distance_percent(position: &Position) -> Option<f64> {
    let price = position.current_price.filter(|p| *p != 0.0 && p.is_finite())?;
    let stop = position.stop_loss.filter(|s| *s != 0.0)?;
    Some(((price - stop) / price * 100.0).abs())
}

/// Days from `as_of` until the futures roll, if one is scheduled.
pub fn days_to_roll(position: &Position, as_of: NaiveDate) -> Option<i64> {
    position.roll_date().map(|d| (d - as_of).num_days())
}

fn thesis_broken(reasoning: &str) -> bool {
    BROKEN_THESIS.iter().any(|p| reasoning.contains(p))
}

/// Scores positions as of a fixed date so results are reproducible.
#[derive(Debug, Clone, Copy)]
pub struct HealthScorer {
    as_of: NaiveDate,
}

impl HealthScorer {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    /// Health score in `[0, 100]`.
    pub fn score(&self, position: &Position) -> u8 {
        self.assess(position).score
    }

    /// Score a position and keep the per-factor breakdown.
    pub fn assess(&self, position: &Position) -> PositionHealth {
        let stop_loss_penalty = match stop_distance_percent(position) {
            Some(d) if d < 3.0 => 40,
            Some(d) if d < 5.0 => 30,
            Some(d) if d < 10.0 => 20,
            Some(d) if d < 15.0 => 10,
            _ => 0,
        };

        let pnl_percent = position
            .unrealized_pnl_percent
            .filter(|p| p.is_finite())
            .unwrap_or(0.0);
        let profitability_adjustment = if pnl_percent < -15.0 {
            -30
        } else if pnl_percent < -8.0 {
            -20
        } else if pnl_percent < -3.0 {
            -10
        } else if pnl_percent > 15.0 {
            5
        } else {
            0
        };

        let thesis_penalty = match position.reasoning.as_deref().map(str::to_lowercase) {
            Some(r) if thesis_broken(&r) => 20,
            Some(r) if WEAK_THESIS.iter().any(|p| r.contains(p)) => 10,
            _ => 0,
        };

        // Only a roll still ahead of us counts.
        let roll_penalty = match days_to_roll(position, self.as_of) {
            Some(d) if d > 0 && d < 3 => 10,
            Some(d) if d > 0 && d < 7 => 5,
            _ => 0,
        };

        let mut score = 100 - stop_loss_penalty;
        score = if profitability_adjustment > 0 {
            (score + profitability_adjustment).min(100)
        } else {
            score + profitability_adjustment
        };
        score -= thesis_penalty + roll_penalty;
        let score = score.clamp(0, 100) as u8;

        PositionHealth {
            position_id: position.id.clone(),
            score,
            status: HealthStatus::from_score(score),
            stop_loss_penalty,
            profitability_adjustment,
            thesis_penalty,
            roll_penalty,
        }
    }

    /// Issues that need a decision on this position, if any.
    pub fn review(&self, position: &Position) -> Option<PositionReview> {
        let mut issues = Vec::new();
        let mut urgency = Urgency::Medium;

        if let (Some(distance), Some(price), Some(stop)) =
            (stop_distance_percent(position), position.current_price, position.stop_loss)
        {
            let value = format!("${:.2} ({:.1}%)", (price - stop).abs(), distance);
            if distance < 5.0 {
                issues.push(ReviewIssue::new("Stop Loss Proximity", value, IssueSeverity::Urgent));
                urgency = Urgency::Critical;
            } else if distance < 10.0 {
                issues.push(ReviewIssue::new("Stop Loss Warning", value, IssueSeverity::Warning));
                urgency = urgency.at_least(Urgency::High);
            }
        }

        if let Some(reasoning) = &position.reasoning {
            if thesis_broken(&reasoning.to_lowercase()) {
                issues.push(ReviewIssue::new("Thesis Status", "INVALIDATED", IssueSeverity::Negative));
                urgency = urgency.at_least(Urgency::High);
            }
        }

        if let Some(days) = days_to_roll(position, self.as_of).filter(|d| *d > 0 && *d < 7) {
            let value = format!("{} days (cost: ${})", days, position.roll_cost().unwrap_or(0.0));
            issues.push(ReviewIssue::new("Roll Date", value, IssueSeverity::Warning));
            urgency = urgency.at_least(Urgency::High);
        }

        if let Some(pnl) = position.unrealized_pnl_percent.filter(|p| *p < -8.0) {
            issues.push(ReviewIssue::new(
                "Unrealized Loss",
                format!("{:.1}%", pnl),
                IssueSeverity::Negative,
            ));
        }

        if issues.is_empty() {
            return None;
        }

        Some(PositionReview {
            position_id: position.id.clone(),
            symbol: position.symbol.clone(),
            urgency,
            recommendation: urgency.recommendation().to_string(),
            issues,
        })
    }

    /// Reviews for every position needing action, most urgent first.
    pub fn review_all(&self, positions: &[Position]) -> Vec<PositionReview> {
        let mut reviews: Vec<PositionReview> =
            positions.iter().filter_map(|p| self.review(p)).collect();
        reviews.sort_by(|a, b| b.urgency.cmp(&a.urgency));
        reviews
    }
}

/// How soon a reviewed position needs attention.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Medium,
    High,
    Critical,
}

impl Urgency {
    fn at_least(self, other: Urgency) -> Urgency {
        self.max(other)
    }

    fn recommendation(&self) -> &'static str {
        match self {
            Urgency::Critical => {
                "Consider immediate position review. Multiple risk factors present including \
                 proximity to stop loss and thesis invalidation. Evaluate exit or adjustment strategies."
            }
            Urgency::High => {
                "Position requires attention within 24-48 hours. Monitor closely and prepare contingency plans."
            }
            Urgency::Medium => {
                "Review position during next trading session. Consider rebalancing or adjusting risk parameters."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Urgent,
    Warning,
    Negative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewIssue {
    pub kind: String,
    pub value: String,
    pub severity: IssueSeverity,
}

impl ReviewIssue {
    fn new(kind: &str, value: impl Into<String>, severity: IssueSeverity) -> Self {
        Self {
            kind: kind.to_string(),
            value: value.into(),
            severity,
        }
    }
}

/// A position flagged for action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionReview {
    pub position_id: String,
    pub symbol: String,
    pub urgency: Urgency,
    pub issues: Vec<ReviewIssue>,
    pub recommendation: String,
}
