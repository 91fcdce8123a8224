//! Model-vs-market divergence and edge classification.

use crate::types::{DivergenceRecord, Edge, MarketQuote};
use tracing::debug;

/// Divergence beyond which an edge is strong.
pub const STRONG_EDGE: f64 = 10.0;
/// Divergence beyond which an edge is tradeable.
pub const EDGE: f64 = 5.0;

const BASE_CONFIDENCE: f64 = 75.0;
const MAX_CONFIDENCE_PENALTY: f64 = 15.0;
const MIN_CONFIDENCE: f64 = 50.0;

/// Classify a signed divergence. Exact band edges fall into the narrower band.
pub fn classify_edge(divergence: f64) -> Edge {
    let abs = divergence.abs();
    let buy = divergence > 0.0;

    if abs > STRONG_EDGE {
        if buy {
            Edge::StrongBuy
        } else {
            Edge::StrongSell
        }
    } else if abs > EDGE {
        if buy {
            Edge::Buy
        } else {
            Edge::Sell
        }
    } else {
        Edge::Fair
    }
}

/// Confidence in the model's edge. Falls as divergence widens, since a wide
/// gap is also evidence the market knows something the model does not.
pub fn confidence(abs_divergence: f64) -> f64 {
    let penalty = (abs_divergence / 2.0).min(MAX_CONFIDENCE_PENALTY);
    (BASE_CONFIDENCE - penalty).clamp(MIN_CONFIDENCE, BASE_CONFIDENCE)
}

/// Compare the model probability with external market quotes.
///
/// `quotes` are in priority order; the first with a finite probability is
/// used. With no usable quote the record carries `Edge::NoMarket`.
pub fn compute_divergence(scenario: &str, model_probability: f64, quotes: &[MarketQuote]) -> DivergenceRecord {
    let source = quotes
        .iter()
        .find(|q| q.probability.is_some_and(f64::is_finite));

    let Some((quote, market)) = source.and_then(|q| q.probability.map(|p| (q, p))) else {
        return DivergenceRecord {
            scenario: scenario.to_string(),
            model_probability,
            market_probability: None,
            market_source: None,
            quotes: quotes.to_vec(),
            divergence: None,
            edge: Edge::NoMarket,
            confidence: 0.0,
            reasoning: "No active prediction market found. Monitor for market creation.".to_string(),
            suggested_trade: "No market available".to_string(),
            expected_value: "N/A".to_string(),
            risk_note: None,
            market_url: None,
        };
    };

    let divergence = model_probability - market;
    let edge = classify_edge(divergence);
    debug!(scenario, venue = %quote.venue, divergence, edge = edge.as_str(), "Classified edge");

    DivergenceRecord {
        scenario: scenario.to_string(),
        model_probability,
        market_probability: Some(market),
        market_source: Some(quote.venue.clone()),
        quotes: quotes.to_vec(),
        divergence: Some(divergence),
        edge,
        confidence: confidence(divergence.abs()),
        reasoning: reasoning(divergence, &quote.venue),
        suggested_trade: suggested_trade(scenario, edge, market, &quote.venue),
        expected_value: expected_value(divergence),
        risk_note: Some(format!("Max loss {}¢", cents(market))),
        market_url: quote.url.clone(),
    }
}

/// Divergence records for a batch of scenarios.
///
/// `markets` yields the quotes for a scenario, in priority order.
pub fn compute_divergences<'a, F>(models: &[(String, f64)], mut markets: F) -> Vec<DivergenceRecord>
where
    F: FnMut(&str) -> &'a [MarketQuote],
{
    models
        .iter()
        .map(|(scenario, model)| compute_divergence(scenario, *model, markets(scenario)))
        .collect()
}

/// The `n` actionable records with the widest divergence.
pub fn top_opportunities(records: &[DivergenceRecord], n: usize) -> Vec<&DivergenceRecord> {
    let mut actionable: Vec<&DivergenceRecord> = records
        .iter()
        .filter(|r| r.edge.is_buy() || r.edge.is_sell())
        .collect();
    actionable.sort_by(|a, b| {
        let a = a.divergence.unwrap_or(0.0).abs();
        let b = b.divergence.unwrap_or(0.0).abs();
        b.total_cmp(&a)
    });
    actionable.truncate(n);
    actionable
}

fn reasoning(divergence: f64, venue: &str) -> String {
    let stance = if divergence > 0.0 {
        "Model prices the scenario above the market"
    } else if divergence < 0.0 {
        "Model prices the scenario below the market"
    } else {
        "Model and market agree"
    };
    format!("{} by {:.1} points. (Source: {})", stance, divergence.abs(), venue)
}

fn suggested_trade(scenario: &str, edge: Edge, market: f64, venue: &str) -> String {
    if edge.is_buy() {
        format!("Long {} \"{}\" @ {}¢", venue, scenario, cents(market))
    } else if edge.is_sell() {
        format!("Short/Fade {} \"{}\" @ {}¢", venue, scenario, cents(market))
    } else {
        "No position - fair value".to_string()
    }
}

/// Rough payoff if the model is right: twice the divergence, in percent.
fn expected_value(divergence: f64) -> String {
    let sign = if divergence > 0.0 { "+" } else { "" };
    format!("{}{}% if correct", sign, (divergence * 2.0).round())
}

/// Percent probability as whole cents, halves rounded away from zero.
fn cents(percent: f64) -> f64 {
    percent.round()
}
