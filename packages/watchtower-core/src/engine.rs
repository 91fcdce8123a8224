//! One refresh pass over the portfolio.
//!
//! `refresh` is pure: it takes the persisted document and this pass's prices
//! and events, and returns everything derived from them. Scheduling, price
//! fetching and persistence belong to the caller.

use crate::markets::PriceMap;
use crate::portfolio::{
    evaluate_trip_wires, revalue, EquityCurveStats, HealthScorer, PortfolioRiskMetrics,
    PositionHealth, PositionReview, DEFAULT_RISK_FREE_RATE, WEEKLY_PERIODS,
};
use crate::types::{Alert, EquityPoint, EventFlags, Portfolio, PortfolioAggregate, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inputs to a refresh pass.
#[derive(Debug, Clone, Copy)]
pub struct RefreshInputs<'a> {
    pub portfolio: &'a Portfolio,
    /// Prices by position id; absent or `None` keeps the last valuation
    pub prices: &'a PriceMap,
    pub events: &'a EventFlags,
    /// Benchmark index level for today's equity-curve point
    pub benchmark_value: Option<f64>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshOutput {
    pub as_of: DateTime<Utc>,
    pub positions: Vec<Position>,
    pub aggregate: PortfolioAggregate,
    pub health: Vec<PositionHealth>,
    /// Positions needing action, most urgent first
    pub reviews: Vec<PositionReview>,
    pub alerts: Vec<Alert>,
    pub risk: PortfolioRiskMetrics,
    /// Today's point on the equity curve
    pub equity_point: EquityPoint,
    /// Curve statistics including today's point
    pub equity_curve: EquityCurveStats,
    /// Ids of positions that kept a previous valuation
    pub stale_positions: Vec<String>,
}

pub fn refresh(inputs: &RefreshInputs<'_>) -> RefreshOutput {
    let portfolio = inputs.portfolio;
    let as_of = inputs.as_of;

    let positions: Vec<Position> = portfolio
        .positions
        .iter()
        .map(|p| {
            let price = inputs.prices.get(&p.id).copied().flatten();
            revalue(p, price, as_of)
        })
        .collect();

    let aggregate = PortfolioAggregate::from_positions(portfolio.cash_reserve, &positions);

    let scorer = HealthScorer::new(as_of.date_naive());
    let health = positions.iter().map(|p| scorer.assess(p)).collect();
    let reviews = scorer.review_all(&positions);

    let alerts = evaluate_trip_wires(
        &portfolio.trip_wires,
        &positions,
        &aggregate,
        inputs.events,
        as_of,
    );

    let equity_point = EquityPoint {
        date: as_of.date_naive(),
        portfolio_value: aggregate.total_capital,
        benchmark_value: inputs.benchmark_value,
    };
    let mut curve: Vec<EquityPoint> = portfolio
        .equity_curve
        .iter()
        .filter(|p| p.date != equity_point.date)
        .cloned()
        .collect();
    curve.push(equity_point.clone());
    curve.sort_by_key(|p| p.date);

    let stale_positions: Vec<String> = positions
        .iter()
        .filter(|p| p.stale)
        .map(|p| p.id.clone())
        .collect();

    debug!(
        positions = positions.len(),
        stale = stale_positions.len(),
        alerts = alerts.len(),
        total_capital = aggregate.total_capital,
        "Refreshed portfolio"
    );

    RefreshOutput {
        as_of,
        risk: PortfolioRiskMetrics::from_positions(&positions, &aggregate, as_of),
        equity_curve: EquityCurveStats::from_curve(&curve, WEEKLY_PERIODS, DEFAULT_RISK_FREE_RATE),
        positions,
        aggregate,
        health,
        reviews,
        alerts,
        equity_point,
        stale_positions,
    }
}
