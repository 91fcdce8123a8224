//! Prediction-market signals.
//!
//! Compares model probabilities with external market quotes and supplies
//! the price-source seam used to revalue positions.

pub mod divergence;
mod model;
mod price;

pub use divergence::{classify_edge, compute_divergence, compute_divergences, top_opportunities};
pub use model::{Factor, RiskFactors, ScenarioFactors};
pub use price::{fetch_prices, PriceMap, PriceSource, QuoteScale, StaticPrices};
