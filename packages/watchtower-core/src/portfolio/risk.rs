//! Equity-curve statistics.
//!
//! Provides period returns, annualized Sharpe ratio, and maximum drawdown over
//! the recorded portfolio and benchmark values.

use crate::types::EquityPoint;
use serde::{Deserialize, Serialize};

/// Equity curve sampled weekly.
pub const WEEKLY_PERIODS: f64 = 52.0;

/// Annual risk-free rate used for the Sharpe ratio.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.05;

/// Return, risk and relative performance over an equity curve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EquityCurveStats {
    /// Portfolio return from first to last point, percent
    pub portfolio_return_percent: f64,
    /// Benchmark return over the same span, percent
    pub benchmark_return_percent: Option<f64>,
    /// Portfolio return minus benchmark return
    pub alpha_percent: Option<f64>,
    pub sharpe_ratio: f64,
    pub benchmark_sharpe_ratio: Option<f64>,
    /// Largest peak-to-trough decline, as a non-positive percent
    pub max_drawdown_percent: f64,
    pub benchmark_max_drawdown_percent: Option<f64>,
}

impl EquityCurveStats {
    /// Calculate statistics for a curve sampled `periods_per_year` times a year.
    pub fn from_curve(curve: &[EquityPoint], periods_per_year: f64, risk_free_rate: f64) -> Self {
        let portfolio: Vec<f64> = curve.iter().map(|p| p.portfolio_value).collect();

        // Benchmark figures need a value on every point.
        let benchmark: Option<Vec<f64>> = curve.iter().map(|p| p.benchmark_value).collect();
        let benchmark = benchmark.filter(|b| b.len() >= 2);

        let portfolio_return_percent = total_return(&portfolio);
        let benchmark_return_percent = benchmark.as_deref().map(total_return);

        Self {
            portfolio_return_percent,
            benchmark_return_percent,
            alpha_percent: benchmark_return_percent.map(|b| portfolio_return_percent - b),
            sharpe_ratio: sharpe_ratio(&portfolio, periods_per_year, risk_free_rate),
            benchmark_sharpe_ratio: benchmark
                .as_deref()
                .map(|b| sharpe_ratio(b, periods_per_year, risk_free_rate)),
            max_drawdown_percent: max_drawdown(&portfolio),
            benchmark_max_drawdown_percent: benchmark.as_deref().map(max_drawdown),
        }
    }
}

/// Percent change from the first to the last value.
pub fn total_return(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(&first), Some(&last)) if first != 0.0 => (last - first) / first * 100.0,
        _ => 0.0,
    }
}

/// Simple returns between consecutive values, skipping zero bases.
pub fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Annualized Sharpe ratio of a value series.
///
/// # Arguments
///
/// * `values` - Portfolio values, one per period
/// * `periods_per_year` - Sampling frequency (52 for weekly)
/// * `risk_free_rate` - Annual risk-free rate (e.g., 0.05 for 5%)
///
/// # Returns
///
/// `(annual return - risk free) / annual volatility`, or 0 without volatility.
pub fn sharpe_ratio(values: &[f64], periods_per_year: f64, risk_free_rate: f64) -> f64 {
    let returns = period_returns(values);
    if returns.is_empty() {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    let annual_return = mean * periods_per_year;
    let annual_std = std * periods_per_year.sqrt();

    if annual_std > 0.0 {
        (annual_return - risk_free_rate) / annual_std
    } else {
        0.0
    }
}

/// Maximum drawdown of a value series as a non-positive percent.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_drawdown = 0.0;

    for &value in values {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown = (value - peak) / peak * 100.0;
            if drawdown < max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }

    max_drawdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn curve(values: &[(f64, Option<f64>)]) -> Vec<EquityPoint> {
        let start = NaiveDate::from_ymd_opt(2025, 11, 18).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &(portfolio_value, benchmark_value))| EquityPoint {
                date: start + chrono::Days::new(7 * i as u64),
                portfolio_value,
                benchmark_value,
            })
            .collect()
    }

    #[test]
    fn test_max_drawdown() {
        let values = vec![100.0, 110.0, 88.0, 95.0, 120.0];
        assert!((max_drawdown(&values) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_drawdown_no_loss() {
        let values = vec![100.0, 101.0, 103.0, 104.0];
        assert_eq!(max_drawdown(&values), 0.0);
    }

    #[test]
    fn test_sharpe_ratio_sign() {
        let rising: Vec<f64> = (0..20).map(|i| 100.0 * 1.01_f64.powi(i) + (i % 2) as f64 * 0.1).collect();
        assert!(sharpe_ratio(&rising, WEEKLY_PERIODS, DEFAULT_RISK_FREE_RATE) > 0.0);

        let falling: Vec<f64> = (0..20).map(|i| 100.0 * 0.99_f64.powi(i) + (i % 2) as f64 * 0.1).collect();
        assert!(sharpe_ratio(&falling, WEEKLY_PERIODS, DEFAULT_RISK_FREE_RATE) < 0.0);
    }

    #[test]
    fn test_sharpe_ratio_flat_is_zero() {
        assert_eq!(sharpe_ratio(&[100.0, 100.0, 100.0], WEEKLY_PERIODS, 0.05), 0.0);
        assert_eq!(sharpe_ratio(&[100.0], WEEKLY_PERIODS, 0.05), 0.0);
    }

    #[test]
    fn test_curve_stats_with_benchmark() {
        let points = curve(&[
            (100_000.0, Some(100_000.0)),
            (104_000.0, Some(101_000.0)),
            (110_000.0, Some(105_000.0)),
        ]);
        let stats = EquityCurveStats::from_curve(&points, WEEKLY_PERIODS, DEFAULT_RISK_FREE_RATE);

        assert!((stats.portfolio_return_percent - 10.0).abs() < 1e-9);
        assert!((stats.benchmark_return_percent.unwrap() - 5.0).abs() < 1e-9);
        assert!((stats.alpha_percent.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(stats.max_drawdown_percent, 0.0);
    }

    #[test]
    fn test_curve_stats_without_full_benchmark() {
        let points = curve(&[(100.0, Some(100.0)), (90.0, None)]);
        let stats = EquityCurveStats::from_curve(&points, WEEKLY_PERIODS, DEFAULT_RISK_FREE_RATE);

        assert!(stats.benchmark_return_percent.is_none());
        assert!(stats.alpha_percent.is_none());
        assert!((stats.max_drawdown_percent + 10.0).abs() < 1e-9);
    }
}
