//! Core data types for the Watchtower risk and signal engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Contract size assumed for futures documents that omit one.
pub const DEFAULT_CONTRACT_SIZE: f64 = 1000.0;

fn default_contract_size() -> f64 {
    DEFAULT_CONTRACT_SIZE
}

/// Side held on a binary prediction-market contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractSide {
    Yes,
    No,
}

/// Instrument class of a position, carrying the class-specific terms.
///
/// Serialized inline with the position under an `instrument_class` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "instrument_class", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instrument {
    Equity,
    Etf,
    Futures {
        /// Units of the underlying per contract
        #[serde(default = "default_contract_size")]
        contract_size: f64,
        /// Margin posted for the position (its cost basis)
        margin: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        roll_date: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        roll_cost: Option<f64>,
    },
    PredictionContract {
        side: ContractSide,
        /// Venue the contract trades on
        #[serde(default, skip_serializing_if = "Option::is_none")]
        market: Option<String>,
    },
}

impl Instrument {
    /// Unit used when describing quantities of this instrument.
    pub fn unit_label(&self) -> &'static str {
        match self {
            Instrument::Equity | Instrument::Etf => "shares",
            Instrument::Futures { .. } | Instrument::PredictionContract { .. } => "contracts",
        }
    }
}

/// One open holding.
///
/// Entry terms (`quantity`, `entry_price`, instrument terms) are fixed when the
/// trade is recorded; only the valuation fields change on a price refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    /// Stable identifier
    pub id: String,
    /// Ticker for listed instruments, scenario name for prediction contracts
    pub symbol: String,
    #[serde(flatten)]
    pub instrument: Instrument,
    /// Signed quantity; negative is short
    pub quantity: f64,
    /// Entry price per unit (probability in `[0, 1]` for prediction contracts)
    pub entry_price: f64,
    /// Same unit as `entry_price`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_exit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Free-text thesis note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
    /// Last known market price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unrealized_pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unrealized_pnl_percent: Option<f64>,
    /// Set when the last refresh could not obtain a price
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Position {
    fn with_instrument(id: &str, symbol: &str, instrument: Instrument, quantity: f64, entry_price: f64) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            instrument,
            quantity,
            entry_price,
            stop_loss: None,
            target_exit: None,
            sector: None,
            region: None,
            reasoning: None,
            opened_at: None,
            current_price: None,
            current_value: None,
            unrealized_pnl: None,
            unrealized_pnl_percent: None,
            stale: false,
            last_updated: None,
        }
    }

    /// Create an equity position. Tickers are stored uppercase.
    pub fn equity(id: &str, symbol: &str, shares: f64, entry_price: f64) -> Self {
        Self::with_instrument(id, &symbol.to_uppercase(), Instrument::Equity, shares, entry_price)
    }

    /// Create an ETF position.
    pub fn etf(id: &str, symbol: &str, shares: f64, entry_price: f64) -> Self {
        Self::with_instrument(id, &symbol.to_uppercase(), Instrument::Etf, shares, entry_price)
    }

    /// Create a leveraged futures position backed by `margin`.
    pub fn futures(
        id: &str,
        symbol: &str,
        contracts: f64,
        entry_price: f64,
        contract_size: f64,
        margin: f64,
    ) -> Self {
        let instrument = Instrument::Futures {
            contract_size,
            margin,
            roll_date: None,
            roll_cost: None,
        };
        Self::with_instrument(id, &symbol.to_uppercase(), instrument, contracts, entry_price)
    }

    /// Create a prediction-market position. `entry_price` is a probability
    /// in `[0, 1]`, as are the position's stop loss and current price.
    pub fn prediction(id: &str, scenario: &str, side: ContractSide, contracts: f64, entry_price: f64) -> Self {
        let instrument = Instrument::PredictionContract { side, market: None };
        Self::with_instrument(id, scenario, instrument, contracts, entry_price)
    }

    pub fn with_stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_target_exit(mut self, target_exit: f64) -> Self {
        self.target_exit = Some(target_exit);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_opened_at(mut self, opened_at: DateTime<Utc>) -> Self {
        self.opened_at = Some(opened_at);
        self
    }

    /// Set the venue of a prediction contract. No effect on other classes.
    pub fn with_market(mut self, venue: impl Into<String>) -> Self {
        if let Instrument::PredictionContract { market, .. } = &mut self.instrument {
            *market = Some(venue.into());
        }
        self
    }

    /// Set the roll schedule of a futures position. No effect on other classes.
    pub fn with_roll(mut self, date: NaiveDate, cost: f64) -> Self {
        if let Instrument::Futures {
            roll_date,
            roll_cost,
            ..
        } = &mut self.instrument
        {
            *roll_date = Some(date);
            *roll_cost = Some(cost);
        }
        self
    }

    /// Capital committed to the position: posted margin for futures,
    /// signed `quantity * entry_price` otherwise.
    pub fn cost_basis(&self) -> f64 {
        match &self.instrument {
            Instrument::Futures { margin, .. } => *margin,
            _ => self.quantity * self.entry_price,
        }
    }

    /// Unsigned economic exposure at entry.
    pub fn notional_entry(&self) -> f64 {
        match &self.instrument {
            Instrument::Futures { contract_size, .. } => {
                (self.quantity * self.entry_price * contract_size).abs()
            }
            _ => (self.quantity * self.entry_price).abs(),
        }
    }

    pub fn unit_label(&self) -> &'static str {
        self.instrument.unit_label()
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn roll_date(&self) -> Option<NaiveDate> {
        match &self.instrument {
            Instrument::Futures { roll_date, .. } => *roll_date,
            _ => None,
        }
    }

    pub fn roll_cost(&self) -> Option<f64> {
        match &self.instrument {
            Instrument::Futures { roll_cost, .. } => *roll_cost,
            _ => None,
        }
    }

    /// Whether a trip-wire scenario key refers to this position.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.symbol.eq_ignore_ascii_case(key)
    }

    /// Copy of the position carrying a fresh valuation.
    ///
    /// `price` is only recorded when the valuation is not stale, so a failed
    /// refresh keeps the last known price.
    pub fn with_valuation(&self, price: Option<f64>, valuation: &Valuation, at: DateTime<Utc>) -> Self {
        if valuation.stale {
            return Self {
                stale: true,
                ..self.clone()
            };
        }

        Self {
            current_price: price.or(self.current_price),
            current_value: Some(valuation.current_value),
            unrealized_pnl: Some(valuation.unrealized_pnl),
            unrealized_pnl_percent: Some(valuation.unrealized_pnl_percent),
            stale: false,
            last_updated: Some(at),
            ..self.clone()
        }
    }
}

/// Result of valuing a position against a price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Valuation {
    pub current_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    /// True when no usable price was available and prior values were reused
    pub stale: bool,
}

/// A point on the portfolio equity curve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub portfolio_value: f64,
    /// Benchmark value on the same date, scaled to the same starting capital
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_value: Option<f64>,
}

/// The persisted portfolio document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Portfolio {
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub trip_wires: Vec<TripWire>,
    #[serde(default)]
    pub cash_reserve: f64,
    #[serde(default)]
    pub equity_curve: Vec<EquityPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Portfolio {
    /// Create a new empty portfolio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a portfolio with a cash reserve.
    pub fn with_cash(cash_reserve: f64) -> Self {
        Self {
            cash_reserve,
            ..Default::default()
        }
    }

    /// Derived capital figures for the current position set.
    pub fn aggregate(&self) -> PortfolioAggregate {
        PortfolioAggregate::from_positions(self.cash_reserve, &self.positions)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn find_position(&self, id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    /// Insert or replace the equity point for `point.date`.
    pub fn record_equity_point(&mut self, point: EquityPoint) {
        match self.equity_curve.iter_mut().find(|p| p.date == point.date) {
            Some(existing) => *existing = point,
            None => {
                self.equity_curve.push(point);
                self.equity_curve.sort_by_key(|p| p.date);
            }
        }
    }
}

/// Capital figures derived from a set of positions.
///
/// `total_capital == cash_reserve + deployed_capital + unrealized_pnl`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct PortfolioAggregate {
    pub cash_reserve: f64,
    /// Σ |cost basis|
    pub deployed_capital: f64,
    pub unrealized_pnl: f64,
    pub total_capital: f64,
}

impl PortfolioAggregate {
    pub fn from_positions(cash_reserve: f64, positions: &[Position]) -> Self {
        let deployed_capital: f64 = positions
            .iter()
            .map(|p| p.cost_basis().abs())
            .filter(|v| v.is_finite())
            .sum();
        let unrealized_pnl: f64 = positions
            .iter()
            .filter_map(|p| p.unrealized_pnl)
            .filter(|v| v.is_finite())
            .sum();

        Self {
            cash_reserve,
            deployed_capital,
            unrealized_pnl,
            total_capital: cash_reserve + deployed_capital + unrealized_pnl,
        }
    }
}

/// Kind of condition a trip wire watches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripWireCondition {
    /// Compared with the position's current price, so a probability in
    /// `[0, 1]` for prediction contracts.
    PriceThreshold {
        direction: ThresholdDirection,
        threshold: f64,
    },
    /// Positive thresholds fire on gains at or above, negative on losses at or below.
    PortfolioRisk { threshold: f64 },
    EventTrigger { event: String },
}

impl TripWireCondition {
    pub fn kind(&self) -> &'static str {
        match self {
            TripWireCondition::PriceThreshold { .. } => "PRICE_THRESHOLD",
            TripWireCondition::PortfolioRisk { .. } => "PORTFOLIO_RISK",
            TripWireCondition::EventTrigger { .. } => "EVENT_TRIGGER",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThresholdDirection {
    Above,
    Below,
}

/// Prescribed response when a trip wire fires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TripWireAction {
    #[serde(rename = "STOP_LOSS")]
    StopLoss,
    #[serde(rename = "TAKE_PROFIT_50%")]
    TakeProfitHalf,
    #[serde(rename = "ADD_100%_POSITION")]
    DoublePosition,
    #[serde(rename = "REDUCE_ALL_POSITIONS_25%")]
    ReduceAllQuarter,
    #[serde(rename = "TAKE_PROFIT_50%_ALL")]
    TakeProfitHalfAll,
}

impl TripWireAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripWireAction::StopLoss => "STOP_LOSS",
            TripWireAction::TakeProfitHalf => "TAKE_PROFIT_50%",
            TripWireAction::DoublePosition => "ADD_100%_POSITION",
            TripWireAction::ReduceAllQuarter => "REDUCE_ALL_POSITIONS_25%",
            TripWireAction::TakeProfitHalfAll => "TAKE_PROFIT_50%_ALL",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TripWireStatus {
    #[default]
    Active,
    Disabled,
}

/// Declarative alert condition. Only `status` changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripWire {
    pub id: String,
    #[serde(flatten)]
    pub condition: TripWireCondition,
    /// Position key the wire applies to; `None` means portfolio-wide
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    pub action: TripWireAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub status: TripWireStatus,
}

impl TripWire {
    pub fn new(id: &str, condition: TripWireCondition, action: TripWireAction) -> Self {
        Self {
            id: id.to_string(),
            condition,
            scenario: None,
            action,
            reasoning: None,
            status: TripWireStatus::Active,
        }
    }

    pub fn for_scenario(mut self, scenario: &str) -> Self {
        self.scenario = Some(scenario.to_string());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TripWireStatus::Active
    }
}

/// Externally detected events, keyed by the name a trip wire references.
pub type EventFlags = HashMap<String, bool>;

/// A triggered trip wire with its generated instruction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub trip_wire_id: String,
    /// Condition kind, e.g. `PRICE_THRESHOLD`
    #[serde(rename = "type")]
    pub kind: String,
    /// Scenario the wire watches, or `PORTFOLIO`
    pub scenario: String,
    pub action: TripWireAction,
    pub instruction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub triggered_at: DateTime<Utc>,
}

/// Discrete trade-opportunity classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Edge {
    #[serde(rename = "STRONG BUY")]
    StrongBuy,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "FAIR")]
    Fair,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "STRONG SELL")]
    StrongSell,
    #[serde(rename = "NO_MARKET")]
    NoMarket,
}

impl Edge {
    pub fn is_buy(&self) -> bool {
        matches!(self, Edge::StrongBuy | Edge::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Edge::StrongSell | Edge::Sell)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::StrongBuy => "STRONG BUY",
            Edge::Buy => "BUY",
            Edge::Fair => "FAIR",
            Edge::Sell => "SELL",
            Edge::StrongSell => "STRONG SELL",
            Edge::NoMarket => "NO_MARKET",
        }
    }
}

/// Probability quoted by one external market for a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketQuote {
    /// Venue name, e.g. "Polymarket"
    pub venue: String,
    /// Implied probability, 0-100
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MarketQuote {
    pub fn new(venue: &str, probability: Option<f64>) -> Self {
        Self {
            venue: venue.to_string(),
            probability,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Model-vs-market comparison for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DivergenceRecord {
    pub scenario: String,
    /// Internal model probability, 0-100
    pub model_probability: f64,
    /// Probability from the first venue with a quote
    pub market_probability: Option<f64>,
    pub market_source: Option<String>,
    /// Every venue consulted, in priority order
    pub quotes: Vec<MarketQuote>,
    /// `model_probability - market_probability`
    pub divergence: Option<f64>,
    pub edge: Edge,
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_trade: String,
    pub expected_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_url: Option<String>,
}

/// One scenario's entry in a daily prediction snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioSnapshot {
    /// Model probability, 0-100
    pub model_probability: f64,
    /// Primary market probability, 0-100
    pub primary_price: Option<f64>,
    /// Fallback market probability, 0-100
    #[serde(default)]
    pub fallback_price: Option<f64>,
    pub divergence: f64,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub actual_outcome: Option<bool>,
}

impl ScenarioSnapshot {
    /// Pending snapshot with divergence rounded to one decimal.
    pub fn new(model_probability: f64, primary_price: Option<f64>, fallback_price: Option<f64>) -> Self {
        let market = primary_price.or(fallback_price);
        let divergence = market
            .map(|m| ((model_probability - m) * 10.0).round() / 10.0)
            .unwrap_or(0.0);

        Self {
            model_probability,
            primary_price,
            fallback_price,
            divergence,
            resolved: false,
            actual_outcome: None,
        }
    }

    /// First available market probability.
    pub fn market_probability(&self) -> Option<f64> {
        self.primary_price.or(self.fallback_price)
    }

    /// Resolved outcome, if the snapshot has left the pending state.
    pub fn outcome(&self) -> Option<bool> {
        if self.resolved {
            self.actual_outcome
        } else {
            None
        }
    }
}

/// All scenario snapshots for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyPrediction {
    pub date: NaiveDate,
    pub scenarios: BTreeMap<String, ScenarioSnapshot>,
}

/// API response wrapper for success cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
