//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! [data]
//! path = "prices.parquet"        # or: synthetic = ["SPY", "TLT"]
//! symbols = ["SPY", "TLT"]       # optional subset; empty = every column
//! start = "2015-01-01"
//! end = "2023-12-31"
//!
//! [portfolio]
//! rebalance_frequency = "monthly"
//! min_history_days = 252
//!
//! [signal]
//! fast_window = 20
//! slow_window = 50
//!
//! [backtest]
//! fee_bps = 5.0
//! ```
//!
//! Every section is optional; omitted fields take the engine defaults.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use portlab_core::config::{BacktestConfig, PortfolioConfig, SignalConfig};

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine settings: {0}")]
    Engine(#[from] portlab_core::ConfigError),

    #[error("invalid [data] section: {0}")]
    Data(String),
}

/// Where prices come from and which slice of them to use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Wide Parquet or CSV price file.
    pub path: Option<PathBuf>,
    /// Symbols to generate deterministic random walks for, instead of a file.
    pub synthetic: Vec<String>,
    /// Column subset to keep. Empty keeps every instrument.
    pub symbols: Vec<String>,
    /// Inclusive first date.
    pub start: Option<NaiveDate>,
    /// Inclusive last date.
    pub end: Option<NaiveDate>,
}

impl DataConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.path, self.synthetic.is_empty()) {
            (Some(_), false) => {
                return Err(ConfigError::Data(
                    "set either `path` or `synthetic`, not both".into(),
                ))
            }
            (None, true) => {
                return Err(ConfigError::Data(
                    "one of `path` or `synthetic` is required".into(),
                ))
            }
            (None, false) if self.start.is_none() || self.end.is_none() => {
                return Err(ConfigError::Data(
                    "synthetic data needs both `start` and `end`".into(),
                ))
            }
            _ => {}
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(ConfigError::Data(format!(
                    "start {start} is after end {end}"
                )));
            }
        }
        Ok(())
    }
}

/// Everything needed to reproduce a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: DataConfig,
    pub portfolio: PortfolioConfig,
    pub signal: SignalConfig,
    pub backtest: BacktestConfig,
}

impl RunConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.data.validate()?;
        self.portfolio.validate()?;
        self.signal.validate()?;
        self.backtest.validate()?;
        Ok(())
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs get the same RunId.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
