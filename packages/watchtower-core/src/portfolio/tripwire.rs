//! Trip-wire evaluation.
//!
//! Evaluation is a pure function of the current positions, the portfolio
//! aggregate and the supplied event flags. A wire fires on every pass for as
//! long as its condition holds; acknowledging alerts is up to the caller.

use crate::types::{
    Alert, EventFlags, PortfolioAggregate, Position, ThresholdDirection, TripWire, TripWireAction,
    TripWireCondition,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Alerts for every active wire whose condition currently holds.
pub fn evaluate(
    trip_wires: &[TripWire],
    positions: &[Position],
    aggregate: &PortfolioAggregate,
    events: &EventFlags,
    at: DateTime<Utc>,
) -> Vec<Alert> {
    trip_wires
        .iter()
        .filter(|tw| tw.is_active())
        .filter_map(|tw| {
            let position = tw
                .scenario
                .as_deref()
                .and_then(|key| positions.iter().find(|p| p.matches(key)));

            if !is_triggered(tw, position, aggregate, events) {
                return None;
            }
            info!(
                trip_wire = %tw.id,
                kind = tw.condition.kind(),
                action = tw.action.as_str(),
                "Trip wire triggered"
            );

            Some(Alert {
                trip_wire_id: tw.id.clone(),
                kind: tw.condition.kind().to_string(),
                scenario: tw.scenario.clone().unwrap_or_else(|| "PORTFOLIO".to_string()),
                action: tw.action,
                instruction: action_instruction(tw.action, position, positions.len()),
                reasoning: tw.reasoning.clone(),
                triggered_at: at,
            })
        })
        .collect()
}

fn is_triggered(
    tw: &TripWire,
    position: Option<&Position>,
    aggregate: &PortfolioAggregate,
    events: &EventFlags,
) -> bool {
    match &tw.condition {
        TripWireCondition::PriceThreshold {
            direction,
            threshold,
        } => {
            let Some(position) = position else {
                warn!(
                    trip_wire = %tw.id,
                    scenario = tw.scenario.as_deref().unwrap_or("-"),
                    "price trip wire references no open position"
                );
                return false;
            };
            match (position.current_price, direction) {
                (Some(price), ThresholdDirection::Above) => price >= *threshold,
                (Some(price), ThresholdDirection::Below) => price <= *threshold,
                (None, _) => false,
            }
        }
        TripWireCondition::PortfolioRisk { threshold } => {
            let pnl = aggregate.unrealized_pnl;
            (*threshold > 0.0 && pnl >= *threshold) || (*threshold < 0.0 && pnl <= *threshold)
        }
        TripWireCondition::EventTrigger { event } => events.get(event).copied().unwrap_or(false),
    }
}

/// Whole quantities print without decimals; fractional ones keep two.
fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{:.0}", quantity)
    } else {
        format!("{:.2}", quantity)
    }
}

/// Templated instruction for a fired wire.
///
/// Position-level actions fall back to a portfolio-wide instruction when the
/// wire is not bound to an open position.
pub fn action_instruction(
    action: TripWireAction,
    position: Option<&Position>,
    open_positions: usize,
) -> String {
    match (action, position) {
        (TripWireAction::StopLoss, Some(p)) => {
            let verb = if p.is_short() { "Buy to cover" } else { "Sell" };
            format!(
                "{} all {} {} of {} at market",
                verb,
                format_quantity(p.quantity.abs()),
                p.unit_label(),
                p.symbol
            )
        }
        (TripWireAction::TakeProfitHalf, Some(p)) => {
            let verb = if p.is_short() { "Buy to cover" } else { "Sell" };
            format!(
                "{} {} {} of {} (50% of position)",
                verb,
                format_quantity((p.quantity.abs() / 2.0).floor()),
                p.unit_label(),
                p.symbol
            )
        }
        (TripWireAction::DoublePosition, Some(p)) => {
            let verb = if p.is_short() { "Sell short" } else { "Buy" };
            format!(
                "{} {} more {} of {}",
                verb,
                format_quantity(p.quantity.abs()),
                p.unit_label(),
                p.symbol
            )
        }
        (TripWireAction::StopLoss, None) => {
            format!("Close all {} open positions at market", open_positions)
        }
        (TripWireAction::TakeProfitHalf, None) | (TripWireAction::TakeProfitHalfAll, _) => {
            format!("Take profit on 50% of each of {} open positions", open_positions)
        }
        (TripWireAction::DoublePosition, None) => {
            "Double exposure in the positions named by the trip wire".to_string()
        }
        (TripWireAction::ReduceAllQuarter, _) => {
            format!("Reduce each of {} open positions by 25%", open_positions)
        }
    }
}
