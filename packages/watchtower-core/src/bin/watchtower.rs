//! Watchtower CLI - Command line interface for portfolio risk and market signals.
//!
//! Every command prints one JSON `ApiResponse` envelope on stdout. Logs go to
//! stderr, filtered by `RUST_LOG` (default `watchtower_core=info`).

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use watchtower_core::{
    engine::{refresh, RefreshInputs},
    history::HistoryStore,
    markets::{
        compute_divergences, fetch_prices, top_opportunities, QuoteScale, RiskFactors, StaticPrices,
    },
    portfolio::PortfolioTracker,
    types::{EventFlags, MarketQuote, ScenarioSnapshot, TripWireStatus},
    ApiResponse, EngineConfig, Result,
};

#[derive(Parser)]
#[command(name = "watchtower")]
#[command(about = "Watchtower CLI - portfolio risk and prediction-market signals")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Portfolio commands
    Portfolio {
        #[command(subcommand)]
        action: PortfolioAction,
    },
    /// Trip wire commands
    Tripwire {
        #[command(subcommand)]
        action: TripWireAction,
    },
    /// Compare model probabilities with market quotes
    Divergence {
        /// Number of top opportunities to list
        #[arg(short, long, default_value = "3")]
        top: usize,
    },
    /// Prediction history commands
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum PortfolioAction {
    /// Get portfolio status
    Status,
    /// Revalue positions, score health and evaluate trip wires
    Refresh {
        /// JSON object of symbol to current price
        #[arg(short, long)]
        prices: Option<PathBuf>,
        /// Prediction-contract prices in the file are in cents
        #[arg(long)]
        cents: bool,
        /// Event flag that has occurred (repeatable)
        #[arg(short, long)]
        event: Vec<String>,
        /// Benchmark index level for today's equity-curve point
        #[arg(short, long)]
        benchmark: Option<f64>,
    },
    /// Get or set cash reserve
    Cash {
        /// Cash amount to set (optional)
        #[arg(short, long)]
        set: Option<f64>,
    },
}

#[derive(Subcommand)]
enum TripWireAction {
    /// List all trip wires
    List,
    /// Enable a trip wire
    Enable {
        #[arg(short, long)]
        id: String,
    },
    /// Disable a trip wire
    Disable {
        #[arg(short, long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Log today's model and market probabilities
    Log {
        /// Snapshot date (defaults to today, UTC)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Record the outcome of a scenario
    Resolve {
        #[arg(short, long)]
        scenario: String,
        #[arg(short, long, value_enum)]
        outcome: Outcome,
        /// Only resolve snapshots on or before this date
        #[arg(short, long)]
        up_to: Option<NaiveDate>,
    },
    /// Accuracy and calibration analytics
    Analytics,
}

#[derive(Clone, Copy, ValueEnum)]
enum Outcome {
    Yes,
    No,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("watchtower_core=info")))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    let result = match cli.command {
        Commands::Portfolio { action } => handle_portfolio(&config, action).await,
        Commands::Tripwire { action } => handle_trip_wire(&config, action),
        Commands::Divergence { top } => handle_divergence(&config, top),
        Commands::History { action } => handle_history(&config, action),
    };

    let output = match result {
        Ok(data) => render(&ApiResponse::ok(data)),
        Err(e) => {
            error!(error = %e, "Command failed");
            render(&ApiResponse::<()>::err(e.to_string()))
        }
    };

    println!("{}", output);
}

fn render<T: Serialize>(response: &ApiResponse<T>) -> String {
    serde_json::to_string_pretty(response)
        .unwrap_or_else(|e| json!({ "ok": false, "error": e.to_string() }).to_string())
}

async fn handle_portfolio(config: &EngineConfig, action: PortfolioAction) -> Result<Value> {
    let mut tracker = PortfolioTracker::open(config.portfolio_path.clone())?;

    match action {
        PortfolioAction::Status => {
            let portfolio = tracker.get();
            Ok(json!({
                "positions": portfolio.positions,
                "position_count": portfolio.position_count(),
                "aggregate": portfolio.aggregate(),
                "trip_wires": portfolio.trip_wires.len(),
                "equity_curve": portfolio.equity_curve,
                "updated_at": portfolio.updated_at,
            }))
        }
        PortfolioAction::Refresh {
            prices,
            cents,
            event,
            benchmark,
        } => {
            let source: StaticPrices = match prices {
                Some(path) => read_json::<HashMap<String, f64>>(&path)?.into_iter().collect(),
                None => StaticPrices::new(),
            };
            let scale = if cents { QuoteScale::Cents } else { QuoteScale::Probability };
            let source = source.with_contract_scale(scale);
            let prices = fetch_prices(&source, tracker.positions(), config.price_timeout).await;
            let events: EventFlags = event.into_iter().map(|e| (e, true)).collect();

            let output = refresh(&RefreshInputs {
                portfolio: tracker.get(),
                prices: &prices,
                events: &events,
                benchmark_value: benchmark,
                as_of: Utc::now(),
            });
            tracker.apply_refresh(&output);
            tracker.save()?;

            Ok(serde_json::to_value(&output)?)
        }
        PortfolioAction::Cash { set } => {
            if let Some(amount) = set {
                tracker.set_cash_reserve(amount);
                tracker.save()?;
            }
            Ok(json!({
                "cash_reserve": tracker.cash_reserve(),
            }))
        }
    }
}

fn handle_trip_wire(config: &EngineConfig, action: TripWireAction) -> Result<Value> {
    let mut tracker = PortfolioTracker::open(config.portfolio_path.clone())?;

    let (id, status) = match action {
        TripWireAction::List => {
            return Ok(json!({
                "trip_wires": tracker.trip_wires(),
            }))
        }
        TripWireAction::Enable { id } => (id, TripWireStatus::Active),
        TripWireAction::Disable { id } => (id, TripWireStatus::Disabled),
    };

    let trip_wire = tracker.set_trip_wire_status(&id, status)?.clone();
    tracker.save()?;
    Ok(json!({
        "trip_wire": trip_wire,
    }))
}

fn handle_divergence(config: &EngineConfig, top: usize) -> Result<Value> {
    let models = RiskFactors::load(&config.factors_path)?.model_probabilities();
    let markets = load_markets(&config.markets_path)?;

    let records = compute_divergences(&models, |scenario| {
        markets.get(scenario).map(Vec::as_slice).unwrap_or(&[])
    });
    let opportunities = top_opportunities(&records, top);

    Ok(json!({
        "divergences": records,
        "top_opportunities": opportunities,
        "updated_at": Utc::now(),
    }))
}

fn handle_history(config: &EngineConfig, action: HistoryAction) -> Result<Value> {
    let store = HistoryStore::open(config.history_path.clone())?;

    match action {
        HistoryAction::Log { date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let models = RiskFactors::load(&config.factors_path)?.model_probabilities();
            let markets = load_markets(&config.markets_path)?;

            let scenarios: BTreeMap<String, ScenarioSnapshot> = models
                .into_iter()
                .map(|(scenario, model)| {
                    let quotes = markets.get(&scenario).map(Vec::as_slice).unwrap_or(&[]);
                    let price = |i: usize| quotes.get(i).and_then(|q| q.probability);
                    (scenario, ScenarioSnapshot::new(model, price(0), price(1)))
                })
                .collect();

            let summary = store.log_snapshot(date, scenarios)?;
            Ok(json!({
                "date": date,
                "summary": summary,
                "metadata": store.snapshot().metadata,
            }))
        }
        HistoryAction::Resolve {
            scenario,
            outcome,
            up_to,
        } => {
            let outcome = matches!(outcome, Outcome::Yes);
            let resolved = store.resolve(&scenario, outcome, up_to)?;
            Ok(json!({
                "scenario": scenario,
                "outcome": outcome,
                "resolved": resolved,
                "metadata": store.snapshot().metadata,
            }))
        }
        HistoryAction::Analytics => {
            let log = store.snapshot();
            Ok(json!({
                "predictions": log.predictions,
                "metadata": log.metadata,
                "analytics": store.analytics(),
            }))
        }
    }
}

/// Quotes per scenario, in venue priority order. A missing file means no markets.
fn load_markets(path: &Path) -> Result<BTreeMap<String, Vec<MarketQuote>>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
