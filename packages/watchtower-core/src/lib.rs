//! Watchtower Core - Portfolio risk and prediction-market signal engine.
//!
//! This crate provides:
//!
//! - **Valuation**: mark equities, ETFs, futures and prediction contracts to market
//! - **Health scoring**: deterministic 0-100 risk score and action review per position
//! - **Trip wires**: declarative price, portfolio and event conditions with action instructions
//! - **Divergence**: model-vs-market edge classification and trade suggestions
//! - **History**: daily prediction log with accuracy and calibration analytics
//!
//! # Example
//!
//! ```rust,no_run
//! use watchtower_core::engine::{refresh, RefreshInputs};
//! use watchtower_core::markets::PriceMap;
//! use watchtower_core::portfolio::PortfolioTracker;
//! use watchtower_core::types::EventFlags;
//! use watchtower_core::EngineConfig;
//!
//! let config = EngineConfig::from_env();
//! let mut tracker = PortfolioTracker::open(config.portfolio_path)?;
//!
//! let prices: PriceMap = [("cl-apr".to_string(), Some(75.0))].into_iter().collect();
//! let output = refresh(&RefreshInputs {
//!     portfolio: tracker.get(),
//!     prices: &prices,
//!     events: &EventFlags::new(),
//!     benchmark_value: None,
//!     as_of: chrono::Utc::now(),
//! });
//! for alert in &output.alerts {
//!     println!("{}: {}", alert.trip_wire_id, alert.instruction);
//! }
//!
//! tracker.apply_refresh(&output);
//! tracker.save()?;
//! # Ok::<(), watchtower_core::Error>(())
//! ```

pub mod config;
pub mod engine;
pub mod history;
pub mod markets;
pub mod portfolio;
pub mod types;

use std::path::PathBuf;

// Re-export commonly used types
pub use config::EngineConfig;
pub use types::{
    Alert, ApiResponse, DailyPrediction, DivergenceRecord, Edge, Instrument, MarketQuote,
    Portfolio, PortfolioAggregate, Position, ScenarioSnapshot, TripWire, TripWireAction,
    TripWireCondition,
};

// Re-export main functionality
pub use engine::{refresh, RefreshInputs, RefreshOutput};
pub use history::{compute_analytics, HistoryAnalytics, HistoryStore};
pub use markets::{compute_divergence, fetch_prices, PriceSource};
pub use portfolio::{valuate, HealthScorer, HealthStatus, PortfolioTracker};

/// Error types for watchtower-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Trip wire not found: {0}")]
    TripWireNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Corrupt prediction history at {}: {source}", path.display())]
    CorruptHistory {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Price source error: {0}")]
    PriceSource(String),
}

/// Result type for watchtower-core operations.
pub type Result<T> = std::result::Result<T, Error>;
