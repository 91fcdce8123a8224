//! Market-data seam and isolated per-instrument price fetching.

use crate::types::{Instrument, Position};
use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Latest price per position id. `None` means no usable price this pass.
pub type PriceMap = HashMap<String, Option<f64>>;

/// Unit a source quotes prediction contracts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteScale {
    /// Probability in `[0, 1]`
    #[default]
    Probability,
    /// Cents per contract, `0..=100`
    Cents,
}

impl QuoteScale {
    pub fn to_probability(self, price: f64) -> f64 {
        match self {
            QuoteScale::Probability => price,
            QuoteScale::Cents => price / 100.0,
        }
    }
}

/// Supplier of current prices, one call per instrument.
///
/// Prediction-contract symbols are quoted for the side the position holds,
/// in the unit reported by [`PriceSource::contract_scale`].
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn current_price(&self, symbol: &str) -> Result<Option<f64>>;

    fn contract_scale(&self) -> QuoteScale {
        QuoteScale::Probability
    }
}

/// Fixed price table, keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct StaticPrices {
    prices: HashMap<String, f64>,
    contract_scale: QuoteScale,
}

impl StaticPrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.insert(symbol, price);
        self
    }

    /// Declare the unit this table's prediction-contract prices are in.
    pub fn with_contract_scale(mut self, scale: QuoteScale) -> Self {
        self.contract_scale = scale;
        self
    }

    pub fn insert(&mut self, symbol: &str, price: f64) {
        self.prices.insert(symbol.to_uppercase(), price);
    }
}

impl FromIterator<(String, f64)> for StaticPrices {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut prices = Self::new();
        for (symbol, price) in iter {
            prices.insert(&symbol, price);
        }
        prices
    }
}

#[async_trait]
impl PriceSource for StaticPrices {
    async fn current_price(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(self.prices.get(&symbol.to_uppercase()).copied())
    }

    fn contract_scale(&self) -> QuoteScale {
        self.contract_scale
    }
}

/// Fetch a price for every position concurrently.
///
/// Each call is bounded by `timeout`. A failed, timed-out or non-finite quote
/// leaves that position without a price and never affects the others.
///
/// Prediction-contract quotes are converted from the source's
/// [`QuoteScale`] to a probability here, and nowhere else. A converted
/// probability outside `[0, 1]` is discarded.
pub async fn fetch_prices<S>(source: &S, positions: &[Position], timeout: Duration) -> PriceMap
where
    S: PriceSource + ?Sized,
{
    let scale = source.contract_scale();
    let fetches = positions.iter().map(|position| async move {
        let symbol = position.symbol.as_str();
        let price = match tokio::time::timeout(timeout, source.current_price(symbol)).await {
            Ok(Ok(Some(price))) if price.is_finite() => match position.instrument {
                Instrument::PredictionContract { .. } => {
                    let probability = scale.to_probability(price);
                    if (0.0..=1.0).contains(&probability) {
                        debug!(symbol, price, probability, "Fetched contract price");
                        Some(probability)
                    } else {
                        warn!(symbol, price, ?scale, "Contract price out of range");
                        None
                    }
                }
                _ => {
                    debug!(symbol, price, "Fetched price");
                    Some(price)
                }
            },
            Ok(Ok(_)) => {
                warn!(symbol, "No price available");
                None
            }
            Ok(Err(e)) => {
                warn!(symbol, error = %e, "Price fetch failed");
                None
            }
            Err(_) => {
                warn!(symbol, timeout_ms = timeout.as_millis() as u64, "Price fetch timed out");
                None
            }
        };
        (position.id.clone(), price)
    });

    join_all(fetches).await.into_iter().collect()
}
