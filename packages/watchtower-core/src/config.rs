//! Engine configuration from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DATA_DIR: &str = ".watchtower";
const DEFAULT_PRICE_TIMEOUT_MS: u64 = 5000;

/// File locations and price-fetch limits.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Portfolio document (`WATCHTOWER_PORTFOLIO_FILE`)
    pub portfolio_path: PathBuf,
    /// Daily prediction log (`WATCHTOWER_HISTORY_FILE`)
    pub history_path: PathBuf,
    /// Scenario factor model (`WATCHTOWER_FACTORS_FILE`)
    pub factors_path: PathBuf,
    /// Market quotes per scenario (`WATCHTOWER_MARKETS_FILE`)
    pub markets_path: PathBuf,
    /// Bound on each price call (`WATCHTOWER_PRICE_TIMEOUT_MS`)
    pub price_timeout: Duration,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(DATA_DIR));
        Self::from_lookup(|key| env::var(key).ok(), home)
    }

    /// Resolve settings through `lookup`, placing defaults under `data_dir`
    /// (the working directory when there is none).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, data_dir: Option<PathBuf>) -> Self {
        let file = |key: &str, name: &str| -> PathBuf {
            match lookup(key) {
                Some(path) => PathBuf::from(path),
                None => data_dir
                    .as_ref()
                    .map(|dir| dir.join(name))
                    .unwrap_or_else(|| PathBuf::from(name)),
            }
        };

        let timeout_ms = lookup("WATCHTOWER_PRICE_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_PRICE_TIMEOUT_MS);

        Self {
            portfolio_path: file("WATCHTOWER_PORTFOLIO_FILE", "portfolio.json"),
            history_path: file("WATCHTOWER_HISTORY_FILE", "historical-predictions.json"),
            factors_path: file("WATCHTOWER_FACTORS_FILE", "risk-factors.json"),
            markets_path: file("WATCHTOWER_MARKETS_FILE", "markets.json"),
            price_timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned(), Some(PathBuf::from("/home/u/.watchtower")))
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.portfolio_path, PathBuf::from("/home/u/.watchtower/portfolio.json"));
        assert_eq!(
            config.history_path,
            PathBuf::from("/home/u/.watchtower/historical-predictions.json")
        );
        assert_eq!(config.price_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("WATCHTOWER_PORTFOLIO_FILE", "/tmp/p.json"),
            ("WATCHTOWER_PRICE_TIMEOUT_MS", "250"),
        ]);
        assert_eq!(config.portfolio_path, PathBuf::from("/tmp/p.json"));
        assert_eq!(config.price_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_bad_timeout_falls_back() {
        assert_eq!(
            config(&[("WATCHTOWER_PRICE_TIMEOUT_MS", "soon")]).price_timeout,
            Duration::from_millis(5000)
        );
        assert_eq!(
            config(&[("WATCHTOWER_PRICE_TIMEOUT_MS", "0")]).price_timeout,
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn test_without_home() {
        let config = EngineConfig::from_lookup(|_| None, None);
        assert_eq!(config.markets_path, PathBuf::from("markets.json"));
    }
}
