//! Portfolio risk metrics derived from valued positions.

use crate::types::{PortfolioAggregate, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position summary used for best/worst reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionRef {
    pub id: String,
    pub symbol: String,
    pub unrealized_pnl_percent: f64,
}

/// Portfolio-level risk summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioRiskMetrics {
    /// Deployed capital as a percentage of total capital
    pub deployment_ratio: f64,
    /// Gross unrealized gains over gross unrealized losses
    pub profit_factor: f64,
    pub best_position: Option<PositionRef>,
    pub worst_position: Option<PositionRef>,
    /// Mean days held, rounded; 0 when no position carries an open date
    pub average_hold_days: u32,
    /// Percent of gross current value per sector ("Other" when untagged)
    pub sector_exposure: BTreeMap<String, f64>,
    /// Gross long value over gross short value
    pub long_short_ratio: f64,
    pub positions_in_profit: usize,
    pub positions_in_loss: usize,
}

impl PortfolioRiskMetrics {
    /// Calculate risk metrics from valued positions.
    pub fn from_positions(
        positions: &[Position],
        aggregate: &PortfolioAggregate,
        as_of: DateTime<Utc>,
    ) -> Self {
        let deployment_ratio = if aggregate.total_capital != 0.0 {
            aggregate.deployed_capital / aggregate.total_capital * 100.0
        } else {
            0.0
        };

        Self {
            deployment_ratio,
            profit_factor: profit_factor(positions),
            best_position: extreme_position(positions, |a, b| a > b),
            worst_position: extreme_position(positions, |a, b| a < b),
            average_hold_days: average_hold_days(positions, as_of),
            sector_exposure: sector_exposure(positions),
            long_short_ratio: long_short_ratio(positions),
            positions_in_profit: positions
                .iter()
                .filter(|p| p.unrealized_pnl.map(|g| g > 0.0).unwrap_or(false))
                .count(),
            positions_in_loss: positions
                .iter()
                .filter(|p| p.unrealized_pnl.map(|g| g < 0.0).unwrap_or(false))
                .count(),
        }
    }
}

/// Gross gains over gross losses; gross gains when nothing is losing.
pub fn profit_factor(positions: &[Position]) -> f64 {
    let pnls = positions.iter().filter_map(|p| p.unrealized_pnl);
    let (wins, losses) = pnls.fold((0.0, 0.0), |(w, l), pnl| {
        if pnl > 0.0 {
            (w + pnl, l)
        } else {
            (w, l - pnl)
        }
    });

    if losses == 0.0 {
        wins
    } else {
        wins / losses
    }
}

fn extreme_position(positions: &[Position], better: impl Fn(f64, f64) -> bool) -> Option<PositionRef> {
    positions
        .iter()
        .filter_map(|p| p.unrealized_pnl_percent.map(|pct| (p, pct)))
        .fold(None, |best: Option<(&Position, f64)>, (p, pct)| match best {
            Some((_, best_pct)) if !better(pct, best_pct) => best,
            _ => Some((p, pct)),
        })
        .map(|(p, pct)| PositionRef {
            id: p.id.clone(),
            symbol: p.symbol.clone(),
            unrealized_pnl_percent: pct,
        })
}

fn average_hold_days(positions: &[Position], as_of: DateTime<Utc>) -> u32 {
    let held: Vec<i64> = positions
        .iter()
        .filter_map(|p| p.opened_at)
        .map(|opened| {
            let seconds = (as_of - opened).num_seconds().abs();
            (seconds + 86_399) / 86_400
        })
        .collect();

    if held.is_empty() {
        return 0;
    }
    (held.iter().sum::<i64>() as f64 / held.len() as f64).round() as u32
}

fn sector_exposure(positions: &[Position]) -> BTreeMap<String, f64> {
    let mut exposure: BTreeMap<String, f64> = BTreeMap::new();
    for p in positions {
        let sector = p.sector.clone().unwrap_or_else(|| "Other".to_string());
        *exposure.entry(sector).or_default() += p.current_value.unwrap_or(0.0).abs();
    }

    let total: f64 = exposure.values().sum();
    for value in exposure.values_mut() {
        *value = if total > 0.0 { *value / total * 100.0 } else { 0.0 };
    }
    exposure
}

fn long_short_ratio(positions: &[Position]) -> f64 {
    let gross = |short: bool| -> f64 {
        positions
            .iter()
            .filter(|p| p.is_short() == short && p.quantity != 0.0)
            .map(|p| p.current_value.unwrap_or(0.0).abs())
            .sum()
    };
    let long = gross(false);
    let short = gross(true);

    if short == 0.0 {
        long
    } else {
        long / short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::valuation::revalue;
    use crate::types::Portfolio;
    use chrono::Duration;

    fn valued(pos: Position, price: f64) -> Position {
        revalue(&pos, Some(price), Utc::now())
    }

    #[test]
    fn test_risk_metrics() {
        let now = Utc::now();
        let mut portfolio = Portfolio::with_cash(1000.0);
        portfolio.positions.push(
            valued(Position::equity("a", "AAPL", 10.0, 150.0), 175.0)
                .with_sector("Technology")
                .with_opened_at(now - Duration::days(10)),
        );
        portfolio.positions.push(
            valued(Position::equity("b", "XOM", 5.0, 100.0), 90.0)
                .with_sector("Energy")
                .with_opened_at(now - Duration::days(4)),
        );

        let aggregate = portfolio.aggregate();
        let metrics = PortfolioRiskMetrics::from_positions(&portfolio.positions, &aggregate, now);

        // 250 gain, 50 loss
        assert_eq!(metrics.profit_factor, 5.0);
        assert_eq!(metrics.best_position.as_ref().unwrap().id, "a");
        assert_eq!(metrics.worst_position.as_ref().unwrap().id, "b");
        assert_eq!(metrics.average_hold_days, 7);
        assert_eq!(metrics.positions_in_profit, 1);
        assert_eq!(metrics.positions_in_loss, 1);
        // 2000 deployed of 3200 total
        assert!((metrics.deployment_ratio - 62.5).abs() < 1e-9);
        // 1750 / (1750 + 450)
        assert!((metrics.sector_exposure["Technology"] - 79.545454).abs() < 1e-3);
    }

    #[test]
    fn test_profit_factor_without_losses() {
        let positions = vec![valued(Position::equity("a", "AAPL", 10.0, 100.0), 110.0)];
        assert_eq!(profit_factor(&positions), 100.0);
    }

    #[test]
    fn test_long_short_ratio() {
        let positions = vec![
            valued(Position::equity("l", "SPY", 10.0, 100.0), 100.0),
            valued(Position::equity("s", "TSLA", -2.0, 250.0), 250.0),
        ];
        assert_eq!(long_short_ratio(&positions), 2.0);
    }

    #[test]
    fn test_empty_portfolio_is_finite() {
        let metrics =
            PortfolioRiskMetrics::from_positions(&[], &PortfolioAggregate::default(), Utc::now());
        assert_eq!(metrics.deployment_ratio, 0.0);
        assert_eq!(metrics.profit_factor, 0.0);
        assert!(metrics.best_position.is_none());
        assert!(metrics.sector_exposure.is_empty());
        assert_eq!(metrics.long_short_ratio, 0.0);
    }
}
