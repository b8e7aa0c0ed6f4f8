//! Optimization request configuration.
//!
//! A request is a TOML file with five sections:
//!
//! ```toml
//! [universe]
//! symbols = ["^GSPC", "MSFT"]
//!
//! [grid]
//! drop_options = [5.0, 10.0]
//! hold_options = [5, 20]
//! take_profit_options = [2.0, 4.0]
//!
//! [strategy]
//! lookback_days = 3
//! fee_rate = 0.001
//!
//! [backtest]
//! initial_capital = 10000.0
//! start_date = "2000-01-01"
//! end_date = "2025-01-01"
//!
//! [data]
//! cache_dir = "data/cache"
//! ```
//!
//! Everything except `[universe]` and `[grid]` has defaults.

use chrono::NaiveDate;
use dipscan_core::ParameterSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::optimizer::ParamGrid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("universe is empty")]
    EmptyUniverse,

    #[error("grid option list '{0}' is empty")]
    EmptyOptions(&'static str),

    #[error("invalid parameters: {0}")]
    Params(#[from] dipscan_core::ParamError),

    #[error("initial capital must be positive and finite, got {0}")]
    Capital(f64),

    #[error("start date {start} is after end date {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseConfig {
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Drop thresholds in percent.
    pub drop_options: Vec<f64>,
    pub hold_options: Vec<usize>,
    /// Take-profit thresholds in percent.
    pub take_profit_options: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_lookback")]
    pub lookback_days: usize,
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback(),
            fee_rate: default_fee_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_start")]
    pub start_date: NaiveDate,
    #[serde(default = "default_end")]
    pub end_date: NaiveDate,
    /// Evaluate grid cells on the rayon pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_capital(),
            start_date: default_start(),
            end_date: default_end(),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub force_refresh: bool,
    /// Never touch the network; uncached symbols end up empty.
    #[serde(default)]
    pub offline: bool,
    /// Generate a seeded random walk for symbols that cannot be loaded.
    #[serde(default)]
    pub synthetic: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            force_refresh: false,
            offline: false,
            synthetic: false,
        }
    }
}

/// A complete grid-search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeConfig {
    pub universe: UniverseConfig,
    pub grid: GridConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub data: DataConfig,
}

impl OptimizeConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// The stock request: the default grid over the default universe.
    pub fn with_defaults() -> Self {
        Self {
            universe: UniverseConfig {
                symbols: DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect(),
            },
            grid: GridConfig {
                drop_options: vec![2.5, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 12.0],
                hold_options: vec![5, 10, 20, 40],
                take_profit_options: vec![2.0, 4.0, 6.0, 8.0],
            },
            strategy: StrategyConfig::default(),
            backtest: BacktestConfig::default(),
            data: DataConfig::default(),
        }
    }

    /// Rejects requests that cannot produce a meaningful grid search.
    ///
    /// Every combination of the grid is validated as a [`ParameterSet`], so
    /// a bad hold option or a non-finite drop is caught here, before any
    /// data is loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.symbols.is_empty() {
            return Err(ConfigError::EmptyUniverse);
        }
        if self.grid.drop_options.is_empty() {
            return Err(ConfigError::EmptyOptions("drop_options"));
        }
        if self.grid.hold_options.is_empty() {
            return Err(ConfigError::EmptyOptions("hold_options"));
        }
        if self.grid.take_profit_options.is_empty() {
            return Err(ConfigError::EmptyOptions("take_profit_options"));
        }
        let capital = self.backtest.initial_capital;
        if !capital.is_finite() || capital <= 0.0 {
            return Err(ConfigError::Capital(capital));
        }
        if self.backtest.start_date > self.backtest.end_date {
            return Err(ConfigError::DateRange {
                start: self.backtest.start_date,
                end: self.backtest.end_date,
            });
        }
        for params in self.param_grid().parameter_sets() {
            params.validate()?;
        }
        Ok(())
    }

    pub fn param_grid(&self) -> ParamGrid {
        ParamGrid {
            drop_thresholds: self.grid.drop_options.clone(),
            hold_days: self.grid.hold_options.clone(),
            take_profits: self.grid.take_profit_options.clone(),
            lookback_days: self.strategy.lookback_days,
            fee_rate: self.strategy.fee_rate,
        }
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.universe.symbols.iter().map(|s| s.as_str()).collect()
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Fallback universe when none is given.
pub const DEFAULT_UNIVERSE: &[&str] = &["^GDAXI", "^GSPC", "MSFT", "IBM", "SIE.DE", "NVDA", "TSLA"];

/// Single-run defaults used by `dipscan backtest`.
pub fn single_run_defaults() -> ParameterSet {
    ParameterSet {
        drop_threshold_pct: 10.0,
        lookback_days: 15,
        hold_days: 780,
        take_profit_pct: 5.0,
        fee_rate: default_fee_rate(),
    }
}

fn default_lookback() -> usize {
    3
}

fn default_fee_rate() -> f64 {
    0.001
}

fn default_capital() -> f64 {
    10_000.0
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_true() -> bool {
    true
}
