//! Historical prediction tracking.
//!
//! Logs one snapshot per scenario per day, resolves them once outcomes are
//! known, and scores the model's track record against the market.

mod analytics;
mod store;

pub use analytics::{
    compute_analytics, model_was_closer, CalibrationBucket, HistoryAnalytics, ScenarioPerformance,
    ScenarioPoint,
};
pub use store::{HistoryLog, HistoryMetadata, HistoryStore, LogSummary};
