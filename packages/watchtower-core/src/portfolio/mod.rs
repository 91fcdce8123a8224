//! Portfolio management module.
//!
//! Provides position valuation, health scoring, trip-wire evaluation,
//! risk metrics, and persistence of the portfolio document.

pub mod health;
mod performance;
mod risk;
mod tracker;
pub mod tripwire;
mod valuation;

pub use health::{HealthScorer, HealthStatus, PositionHealth, PositionReview, Urgency};
pub use performance::{profit_factor, PortfolioRiskMetrics, PositionRef};
pub use risk::{
    max_drawdown, period_returns, sharpe_ratio, total_return, EquityCurveStats,
    DEFAULT_RISK_FREE_RATE, WEEKLY_PERIODS,
};
pub use tracker::PortfolioTracker;
pub(crate) use tracker::write_atomic;
pub use tripwire::{action_instruction, evaluate as evaluate_trip_wires};
pub use valuation::{revalue, valuate};
