//! Position valuation and unrealized P&L.
//!
//! Each instrument class has its own formula:
//!
//! - **Equities / ETFs**: `value = quantity * price`, P&L against `quantity * entry`.
//! - **Futures**: value is pinned to the posted margin; P&L is
//!   `quantity * (price - entry) * contract_size` and the percentage is taken
//!   against notional exposure, not margin.
//! - **Prediction contracts**: priced as a probability in `[0, 1]`, otherwise
//!   like equities. Quotes in cents are converted by `markets::fetch_prices`
//!   before they reach this module.
//!
//! A missing or non-finite price never produces `NaN`: the prior valuation is
//! returned flagged `stale`.

use crate::types::{Instrument, Position, Valuation};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Percentage of `value` relative to `base`, or 0 when the base is empty.
fn percent_of(value: f64, base: f64) -> f64 {
    if base == 0.0 || !base.is_finite() {
        0.0
    } else {
        value / base * 100.0
    }
}

/// Value a position at `current_price`.
///
/// Returns the position's last persisted valuation with `stale = true` when the
/// price is unavailable.
pub fn valuate(position: &Position, current_price: Option<f64>) -> Valuation {
    let price = match current_price.filter(|p| p.is_finite()) {
        Some(price) => price,
        None => return prior_valuation(position),
    };

    match &position.instrument {
        Instrument::Equity | Instrument::Etf | Instrument::PredictionContract { .. } => {
            linear(position.quantity, position.entry_price, price)
        }
        Instrument::Futures {
            contract_size,
            margin,
            ..
        } => {
            let unrealized_pnl = position.quantity * (price - position.entry_price) * contract_size;
            Valuation {
                current_value: *margin,
                unrealized_pnl,
                unrealized_pnl_percent: percent_of(unrealized_pnl, position.notional_entry()),
                stale: false,
            }
        }
    }
}

fn linear(quantity: f64, entry_price: f64, price: f64) -> Valuation {
    let current_value = quantity * price;
    let cost_basis = quantity * entry_price;
    let unrealized_pnl = current_value - cost_basis;

    Valuation {
        current_value,
        unrealized_pnl,
        unrealized_pnl_percent: percent_of(unrealized_pnl, cost_basis.abs()),
        stale: false,
    }
}

/// Last persisted valuation, or a flat one at cost when none exists.
fn prior_valuation(position: &Position) -> Valuation {
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());

    Valuation {
        current_value: finite(position.current_value).unwrap_or_else(|| position.cost_basis()),
        unrealized_pnl: finite(position.unrealized_pnl).unwrap_or(0.0),
        unrealized_pnl_percent: finite(position.unrealized_pnl_percent).unwrap_or(0.0),
        stale: true,
    }
}

/// Revalue a position, returning the updated copy.
///
/// Entry terms are never touched.
pub fn revalue(position: &Position, current_price: Option<f64>, at: DateTime<Utc>) -> Position {
    let valuation = valuate(position, current_price);

    if valuation.stale {
        warn!(
            position = %position.id,
            symbol = %position.symbol,
            "no usable price, keeping last valuation"
        );
    } else {
        debug!(
            position = %position.id,
            pnl = valuation.unrealized_pnl,
            pnl_percent = valuation.unrealized_pnl_percent,
            "revalued position"
        );
    }

    position.with_valuation(current_price, &valuation, at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContractSide;
    use approx::assert_relative_eq;

    #[test]
    fn test_equity_long() {
        let pos = Position::equity("a", "AAPL", 10.0, 150.0);
        let v = valuate(&pos, Some(175.0));

        assert_eq!(v.current_value, 1750.0);
        assert_eq!(v.unrealized_pnl, 250.0);
        assert_relative_eq!(v.unrealized_pnl_percent, 16.666666666666668, epsilon = 1e-9);
        assert!(!v.stale);
    }

    #[test]
    fn test_equity_pnl_identity_for_all_signs() {
        for &quantity in &[25.0, -25.0, 0.5, -0.5] {
            let pos = Position::equity("x", "XYZ", quantity, 40.0);
            let v = valuate(&pos, Some(37.5));
            assert_eq!(v.unrealized_pnl, v.current_value - quantity * 40.0);
        }
    }

    #[test]
    fn test_short_equity_gains_when_price_falls() {
        let pos = Position::equity("s", "TSLA", -20.0, 250.0);
        let v = valuate(&pos, Some(200.0));

        assert_eq!(v.current_value, -4000.0);
        assert_eq!(v.unrealized_pnl, 1000.0);
        assert_relative_eq!(v.unrealized_pnl_percent, 20.0);
    }

    #[test]
    fn test_futures_end_to_end() {
        let pos = Position::futures("cl", "CL", 5.0, 70.0, 1000.0, 3850.0);
        let v = valuate(&pos, Some(75.0));

        assert_eq!(v.current_value, 3850.0);
        assert_eq!(v.unrealized_pnl, 25_000.0);
        assert_relative_eq!(v.unrealized_pnl_percent, 7.142857142857143, epsilon = 1e-9);
    }

    #[test]
    fn test_futures_percent_is_scale_invariant() {
        let base = Position::futures("a", "CL", 5.0, 70.0, 1000.0, 3850.0);
        let scaled = Position::futures("b", "CL", 15.0, 70.0, 3000.0, 3850.0);

        let a = valuate(&base, Some(72.1));
        let b = valuate(&scaled, Some(72.1));
        assert_relative_eq!(a.unrealized_pnl_percent, b.unrealized_pnl_percent, epsilon = 1e-9);
    }

    #[test]
    fn test_prediction_contract_on_probability_scale() {
        let pos = Position::prediction("p", "China-Taiwan 2026", ContractSide::Yes, 1000.0, 0.12);
        let v = valuate(&pos, Some(0.18));

        assert_relative_eq!(v.current_value, 180.0, epsilon = 1e-9);
        assert_relative_eq!(v.unrealized_pnl, 60.0, epsilon = 1e-9);
        assert_relative_eq!(v.unrealized_pnl_percent, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sub_cent_contract_not_rescaled() {
        // 100 contracts bought at 2 cents, now quoted at 0.9 cents
        let pos = Position::prediction("n", "Russia-NATO 2026", ContractSide::Yes, 100.0, 0.02);
        let v = valuate(&pos, Some(0.009));

        assert_relative_eq!(v.current_value, 0.9, epsilon = 1e-9);
        assert_relative_eq!(v.unrealized_pnl, -1.1, epsilon = 1e-9);
        assert_relative_eq!(v.unrealized_pnl_percent, -55.0, epsilon = 1e-9);

        let one_cent = valuate(&pos, Some(0.01));
        assert_relative_eq!(one_cent.current_value, 1.0, epsilon = 1e-9);

        let certain = revalue(&pos, Some(1.0), Utc::now());
        assert_eq!(certain.current_value, Some(100.0));
        assert_eq!(certain.current_price, Some(1.0));
    }

    #[test]
    fn test_missing_price_keeps_prior_values() {
        let mut pos = Position::equity("a", "AAPL", 10.0, 150.0);
        pos.current_value = Some(1600.0);
        pos.unrealized_pnl = Some(100.0);
        pos.unrealized_pnl_percent = Some(6.67);

        let v = valuate(&pos, None);
        assert!(v.stale);
        assert_eq!(v.current_value, 1600.0);
        assert_eq!(v.unrealized_pnl, 100.0);

        let nan = valuate(&pos, Some(f64::NAN));
        assert!(nan.stale);
    }

    #[test]
    fn test_missing_price_without_history_is_flat() {
        let pos = Position::equity("a", "AAPL", 10.0, 150.0);
        let v = valuate(&pos, None);
        assert_eq!(v.current_value, 1500.0);
        assert_eq!(v.unrealized_pnl, 0.0);
        assert!(v.unrealized_pnl_percent.is_finite());
    }

    #[test]
    fn test_zero_cost_basis_guarded() {
        let pos = Position::equity("z", "FREE", 10.0, 0.0);
        let v = valuate(&pos, Some(5.0));
        assert_eq!(v.unrealized_pnl, 50.0);
        assert_eq!(v.unrealized_pnl_percent, 0.0);
    }

    #[test]
    fn test_revalue_never_touches_entry_terms() {
        let now = Utc::now();
        let pos = Position::equity("a", "AAPL", 10.0, 150.0);
        let updated = revalue(&pos, Some(160.0), now);

        assert_eq!(updated.entry_price, 150.0);
        assert_eq!(updated.quantity, 10.0);
        assert_eq!(updated.current_price, Some(160.0));
        assert_eq!(updated.last_updated, Some(now));

        let stale = revalue(&updated, None, now);
        assert!(stale.stale);
        assert_eq!(stale.current_price, Some(160.0));
        assert_eq!(stale.unrealized_pnl, updated.unrealized_pnl);
    }
}
