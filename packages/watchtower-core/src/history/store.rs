//! Daily prediction log, upserted by `(date, scenario)`.

use super::analytics::{compute_analytics, model_was_closer, HistoryAnalytics};
use crate::portfolio::write_atomic;
use crate::types::{DailyPrediction, ScenarioSnapshot};
use crate::{Error, Result};
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Summary figures kept alongside the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HistoryMetadata {
    /// Resolved snapshots with an outcome
    pub total_predictions: usize,
    pub correct_predictions: usize,
    /// Whole percent; `None` until something resolves
    pub accuracy: Option<u32>,
    /// Mean absolute divergence over every snapshot, one decimal
    pub average_divergence: f64,
    /// Latest date in the log
    pub last_update: Option<NaiveDate>,
}

impl HistoryMetadata {
    pub fn from_predictions(predictions: &[DailyPrediction], last_update: Option<NaiveDate>) -> Self {
        let snapshots = predictions.iter().flat_map(|d| d.scenarios.values());

        let mut total = 0;
        let mut correct = 0;
        let mut divergence = 0.0;
        let mut count = 0;
        for snapshot in snapshots {
            if let Some(closer) = model_was_closer(snapshot) {
                total += 1;
                correct += usize::from(closer);
            }
            divergence += snapshot.divergence.abs();
            count += 1;
        }

        Self {
            total_predictions: total,
            correct_predictions: correct,
            accuracy: (total > 0).then(|| (correct as f64 / total as f64 * 100.0).round() as u32),
            average_divergence: if count > 0 {
                (divergence / count as f64 * 10.0).round() / 10.0
            } else {
                0.0
            },
            last_update,
        }
    }
}

/// Per-scenario result of a snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

/// The persisted prediction document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HistoryLog {
    /// One entry per date, in date order
    #[serde(default)]
    pub predictions: Vec<DailyPrediction>,
    #[serde(default)]
    pub metadata: HistoryMetadata,
}

impl HistoryLog {
    pub fn get(&self, date: NaiveDate, scenario: &str) -> Option<&ScenarioSnapshot> {
        self.predictions
            .iter()
            .find(|d| d.date == date)
            .and_then(|d| d.scenarios.get(scenario))
    }

    /// Upsert each scenario's snapshot for `date`.
    ///
    /// Scenarios already logged that day but absent from `scenarios` are kept.
    /// A resolved entry keeps its outcome when replaced.
    pub fn log_snapshot(
        &mut self,
        date: NaiveDate,
        scenarios: BTreeMap<String, ScenarioSnapshot>,
    ) -> LogSummary {
        let mut summary = LogSummary::default();

        let idx = match self.predictions.iter().position(|d| d.date == date) {
            Some(idx) => idx,
            None => {
                self.predictions.push(DailyPrediction {
                    date,
                    scenarios: BTreeMap::new(),
                });
                self.predictions.len() - 1
            }
        };
        let day = &mut self.predictions[idx].scenarios;

        for (scenario, mut snapshot) in scenarios {
            match day.get(&scenario) {
                None => summary.inserted += 1,
                Some(existing) => {
                    if existing.resolved {
                        if snapshot.resolved && snapshot.actual_outcome != existing.actual_outcome {
                            warn!(%scenario, %date, "Ignoring outcome change on resolved snapshot");
                        }
                        snapshot.resolved = true;
                        snapshot.actual_outcome = existing.actual_outcome;
                    }
                    if *existing == snapshot {
                        summary.unchanged += 1;
                    } else {
                        summary.replaced += 1;
                    }
                }
            }
            day.insert(scenario, snapshot);
        }

        self.predictions.sort_by_key(|d| d.date);
        let latest = self.predictions.last().map(|d| d.date);
        self.metadata = HistoryMetadata::from_predictions(&self.predictions, latest);
        summary
    }

    /// Resolve every pending snapshot of `scenario`, optionally only those
    /// dated on or before `up_to`. Returns how many snapshots changed state.
    ///
    /// Resolution is one-way: a conflicting outcome on an already resolved
    /// snapshot is an error and nothing is changed.
    pub fn resolve(&mut self, scenario: &str, outcome: bool, up_to: Option<NaiveDate>) -> Result<usize> {
        let in_range = |date: NaiveDate| up_to.map_or(true, |limit| date <= limit);

        let conflict = self
            .predictions
            .iter()
            .filter(|d| in_range(d.date))
            .filter_map(|d| d.scenarios.get(scenario).map(|s| (d.date, s)))
            .find(|(_, s)| s.resolved && s.actual_outcome.is_some_and(|o| o != outcome));
        if let Some((date, _)) = conflict {
            return Err(Error::InvalidOperation(format!(
                "{} on {} is already resolved with a different outcome",
                scenario, date
            )));
        }

        let mut changed = 0;
        for day in self.predictions.iter_mut().filter(|d| in_range(d.date)) {
            if let Some(snapshot) = day.scenarios.get_mut(scenario) {
                if snapshot.outcome().is_none() {
                    snapshot.resolved = true;
                    snapshot.actual_outcome = Some(outcome);
                    changed += 1;
                }
            }
        }

        self.metadata = HistoryMetadata::from_predictions(&self.predictions, self.metadata.last_update);
        Ok(changed)
    }
}

/// File-backed prediction log.
///
/// Writers hold the lock for the whole read-modify-persist cycle and the file
/// is replaced atomically, so readers only ever see complete entries.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    log: RwLock<HistoryLog>,
}

impl HistoryStore {
    /// Open the log at `path`. A missing file starts an empty log; a file that
    /// does not parse is `Error::CorruptHistory`.
    pub fn open(path: PathBuf) -> Result<Self> {
        let log = Self::load_from_path(&path)?;
        Ok(Self {
            path,
            log: RwLock::new(log),
        })
    }

    /// Create an in-memory store (no persistence).
    pub fn in_memory(log: HistoryLog) -> Self {
        Self {
            path: PathBuf::new(),
            log: RwLock::new(log),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_path(path: &Path) -> Result<HistoryLog> {
        if !path.exists() {
            return Ok(HistoryLog::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| Error::CorruptHistory {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Copy of the current log.
    pub fn snapshot(&self) -> HistoryLog {
        self.log.read().clone()
    }

    pub fn get(&self, date: NaiveDate, scenario: &str) -> Option<ScenarioSnapshot> {
        self.log.read().get(date, scenario).cloned()
    }

    pub fn analytics(&self) -> HistoryAnalytics {
        compute_analytics(&self.log.read().predictions)
    }

    pub fn log_snapshot(
        &self,
        date: NaiveDate,
        scenarios: BTreeMap<String, ScenarioSnapshot>,
    ) -> Result<LogSummary> {
        let count = scenarios.len();
        let summary = self.update(|log| Ok(log.log_snapshot(date, scenarios)))?;
        info!(%date, scenarios = count, inserted = summary.inserted, replaced = summary.replaced, "Logged daily snapshot");
        Ok(summary)
    }

    pub fn resolve(&self, scenario: &str, outcome: bool, up_to: Option<NaiveDate>) -> Result<usize> {
        let changed = self.update(|log| log.resolve(scenario, outcome, up_to))?;
        info!(scenario, outcome, resolved = changed, "Resolved scenario");
        Ok(changed)
    }

    /// Apply `f` to a copy of the log, persist it, then publish it.
    fn update<T>(&self, f: impl FnOnce(&mut HistoryLog) -> Result<T>) -> Result<T> {
        let mut guard = self.log.write();
        let mut next = guard.clone();
        let value = f(&mut next)?;

        if !self.path.as_os_str().is_empty() {
            let content = serde_json::to_string_pretty(&next)?;
            write_atomic(&self.path, content.as_bytes())?;
        }

        *guard = next;
        Ok(value)
    }
}
