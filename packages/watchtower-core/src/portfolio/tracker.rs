//! Portfolio document persistence.

use crate::engine::RefreshOutput;
use crate::types::{Portfolio, Position, TripWire, TripWireStatus};
use crate::{Error, Result};
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Portfolio tracker that owns the portfolio document and persists it to JSON.
#[derive(Debug)]
pub struct PortfolioTracker {
    /// Path to the portfolio JSON file
    path: PathBuf,
    /// In-memory portfolio state
    portfolio: Portfolio,
}

impl PortfolioTracker {
    /// Open the tracker at `path`. A missing file starts an empty portfolio;
    /// an unreadable one is an error.
    pub fn open(path: PathBuf) -> Result<Self> {
        let portfolio = Self::load_from_path(&path)?;
        Ok(Self { path, portfolio })
    }

    /// Create an in-memory tracker (no persistence).
    pub fn in_memory(portfolio: Portfolio) -> Self {
        Self {
            path: PathBuf::new(),
            portfolio,
        }
    }

    /// Get the current path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_path(path: &Path) -> Result<Portfolio> {
        if !path.exists() {
            return Ok(Portfolio::default());
        }

        let content = fs::read_to_string(path)?;
        let data: serde_json::Value = serde_json::from_str(&content)?;

        // Bare list of positions
        if data.is_array() {
            let positions: Vec<Position> = serde_json::from_value(data)?;
            return Ok(Portfolio {
                positions,
                ..Default::default()
            });
        }

        Ok(serde_json::from_value(data)?)
    }

    /// Save the current portfolio, replacing the file atomically.
    pub fn save(&mut self) -> Result<()> {
        // Skip if in-memory only
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }

        if self.portfolio.created_at.is_none() {
            self.portfolio.created_at = Some(Utc::now());
        }
        self.portfolio.updated_at = Some(Utc::now());

        let content = serde_json::to_string_pretty(&self.portfolio)?;
        write_atomic(&self.path, content.as_bytes())
    }

    /// Reload the portfolio from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.portfolio = Self::load_from_path(&self.path)?;
        Ok(())
    }

    /// Get a reference to the current portfolio.
    pub fn get(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Get all positions.
    pub fn positions(&self) -> &[Position] {
        &self.portfolio.positions
    }

    /// Record a newly opened position.
    pub fn add_position(&mut self, position: Position) -> Result<()> {
        if self.portfolio.find_position(&position.id).is_some() {
            return Err(Error::InvalidOperation(format!(
                "Position already exists: {}",
                position.id
            )));
        }
        self.portfolio.positions.push(position);
        Ok(())
    }

    /// Remove a closed position.
    pub fn remove_position(&mut self, id: &str) -> Result<Position> {
        let idx = self
            .portfolio
            .positions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::PositionNotFound(id.to_string()))?;
        Ok(self.portfolio.positions.remove(idx))
    }

    pub fn trip_wires(&self) -> &[TripWire] {
        &self.portfolio.trip_wires
    }

    pub fn add_trip_wire(&mut self, trip_wire: TripWire) -> Result<()> {
        if self.portfolio.trip_wires.iter().any(|tw| tw.id == trip_wire.id) {
            return Err(Error::InvalidOperation(format!(
                "Trip wire already exists: {}",
                trip_wire.id
            )));
        }
        self.portfolio.trip_wires.push(trip_wire);
        Ok(())
    }

    /// Enable or disable a trip wire. Status is the only mutable field.
    pub fn set_trip_wire_status(&mut self, id: &str, status: TripWireStatus) -> Result<&TripWire> {
        let tw = self
            .portfolio
            .trip_wires
            .iter_mut()
            .find(|tw| tw.id == id)
            .ok_or_else(|| Error::TripWireNotFound(id.to_string()))?;
        tw.status = status;
        Ok(tw)
    }

    pub fn cash_reserve(&self) -> f64 {
        self.portfolio.cash_reserve
    }

    pub fn set_cash_reserve(&mut self, cash: f64) {
        self.portfolio.cash_reserve = cash;
    }

    /// Store the outcome of a refresh pass: revalued positions and the
    /// equity-curve point for the refresh date.
    pub fn apply_refresh(&mut self, output: &RefreshOutput) {
        self.portfolio.positions = output.positions.clone();
        self.portfolio.record_equity_point(output.equity_point.clone());
    }
}

/// Write `bytes` to a temporary sibling of `path` and rename it into place so
/// readers never observe a partially written document.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ThresholdDirection, TripWireAction, TripWireCondition};
    use tempfile::tempdir;

    fn stop_wire(id: &str) -> TripWire {
        TripWire::new(
            id,
            TripWireCondition::PriceThreshold {
                direction: ThresholdDirection::Below,
                threshold: 60.0,
            },
            TripWireAction::StopLoss,
        )
        .for_scenario("CL")
    }

    #[test]
    fn test_add_and_remove_position() {
        let mut tracker = PortfolioTracker::in_memory(Portfolio::new());
        tracker.add_position(Position::equity("a", "AAPL", 10.0, 150.0)).unwrap();
        tracker.add_position(Position::equity("b", "GOOGL", 5.0, 100.0)).unwrap();

        let removed = tracker.remove_position("a").unwrap();
        assert_eq!(removed.symbol, "AAPL");
        assert_eq!(tracker.positions().len(), 1);
        assert_eq!(tracker.positions()[0].id, "b");
    }

    #[test]
    fn test_duplicate_position_rejected() {
        let mut tracker = PortfolioTracker::in_memory(Portfolio::new());
        tracker.add_position(Position::equity("a", "AAPL", 10.0, 150.0)).unwrap();
        let result = tracker.add_position(Position::equity("a", "AAPL", 1.0, 150.0));
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_remove_position_not_found() {
        let mut tracker = PortfolioTracker::in_memory(Portfolio::new());
        let result = tracker.remove_position("missing");
        assert!(matches!(result, Err(Error::PositionNotFound(_))));
    }

    #[test]
    fn test_trip_wire_status_toggle() {
        let mut tracker = PortfolioTracker::in_memory(Portfolio::new());
        tracker.add_trip_wire(stop_wire("tw1")).unwrap();

        let tw = tracker.set_trip_wire_status("tw1", TripWireStatus::Disabled).unwrap();
        assert!(!tw.is_active());
        assert!(matches!(
            tracker.set_trip_wire_status("nope", TripWireStatus::Active),
            Err(Error::TripWireNotFound(_))
        ));
        assert!(tracker.add_trip_wire(stop_wire("tw1")).is_err());
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("portfolio.json");

        {
            let mut tracker = PortfolioTracker::open(path.clone()).unwrap();
            tracker
                .add_position(Position::futures("cl", "CL", 5.0, 70.0, 1000.0, 3850.0))
                .unwrap();
            tracker.add_trip_wire(stop_wire("tw1")).unwrap();
            tracker.set_cash_reserve(5000.0);
            tracker.save().unwrap();
        }

        {
            let tracker = PortfolioTracker::open(path).unwrap();
            assert_eq!(tracker.positions().len(), 1);
            assert_eq!(tracker.positions()[0].cost_basis(), 3850.0);
            assert_eq!(tracker.trip_wires().len(), 1);
            assert_eq!(tracker.cash_reserve(), 5000.0);
            assert!(tracker.get().created_at.is_some());
        }
    }

    #[test]
    fn test_apply_refresh_records_equity_point() {
        use crate::engine::{refresh, RefreshInputs};
        use crate::markets::PriceMap;
        use crate::types::EventFlags;

        let mut tracker = PortfolioTracker::in_memory(Portfolio::with_cash(1000.0));
        tracker.add_position(Position::equity("a", "AAPL", 10.0, 150.0)).unwrap();

        let prices: PriceMap = [("a".to_string(), Some(160.0))].into_iter().collect();
        let events = EventFlags::new();
        for _ in 0..2 {
            let output = refresh(&RefreshInputs {
                portfolio: tracker.get(),
                prices: &prices,
                events: &events,
                benchmark_value: Some(5900.0),
                as_of: Utc::now(),
            });
            tracker.apply_refresh(&output);
        }

        assert_eq!(tracker.positions()[0].current_value, Some(1600.0));
        assert_eq!(tracker.get().equity_curve.len(), 1);
        assert_eq!(tracker.get().equity_curve[0].portfolio_value, 2600.0);
    }

    #[test]
    fn test_bare_position_list_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.json");
        let positions = vec![Position::equity("a", "AAPL", 10.0, 150.0)];
        fs::write(&path, serde_json::to_string(&positions).unwrap()).unwrap();

        let tracker = PortfolioTracker::open(path).unwrap();
        assert_eq!(tracker.positions().len(), 1);
        assert_eq!(tracker.cash_reserve(), 0.0);
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(PortfolioTracker::open(path), Err(Error::Json(_))));
    }
}
