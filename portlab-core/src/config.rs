//! Engine configuration.
//!
//! Every struct deserialises with defaults for omitted fields, so a config
//! file only needs to name what it changes. `validate()` runs before any
//! engine touches data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::estimation::{ExpectedReturnModel, ShrinkageTarget};
use crate::indicators::MovingAverageKind;
use crate::optimizer::{Constraints, DEFAULT_WEIGHT_CUTOFF};
use crate::windowing::{EstimationWindow, RebalanceFrequency};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be finite")]
    NotFinite { field: &'static str },

    #[error("fast_window ({fast}) must be shorter than slow_window ({slow})")]
    WindowOrder { fast: usize, slow: usize },

    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },
}

/// Rolling mean-variance optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub rebalance_frequency: RebalanceFrequency,
    /// Rows of trailing history required before the first rebalance.
    pub min_history_days: usize,
    pub shrinkage_target: ShrinkageTarget,
    pub allow_short: bool,
    pub risk_free_rate: f64,
    pub estimation_window: EstimationWindow,
    pub expected_returns: ExpectedReturnModel,
    pub weight_cutoff: f64,
    /// Per-window solver timeout. `None` waits indefinitely.
    pub solver_timeout_ms: Option<u64>,
    pub trading_days_per_year: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            rebalance_frequency: RebalanceFrequency::Monthly,
            min_history_days: 252,
            shrinkage_target: ShrinkageTarget::ConstantCorrelation,
            allow_short: false,
            risk_free_rate: 0.02,
            estimation_window: EstimationWindow::Period,
            expected_returns: ExpectedReturnModel::Compounded,
            weight_cutoff: DEFAULT_WEIGHT_CUTOFF,
            solver_timeout_ms: None,
            trading_days_per_year: 252.0,
        }
    }
}

impl PortfolioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "risk_free_rate",
            });
        }
        if !(self.trading_days_per_year.is_finite() && self.trading_days_per_year > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "trading_days_per_year",
                value: self.trading_days_per_year,
            });
        }
        if !(self.weight_cutoff.is_finite() && self.weight_cutoff >= 0.0) {
            return Err(ConfigError::NotPositive {
                field: "weight_cutoff",
                value: self.weight_cutoff,
            });
        }
        if let EstimationWindow::Trailing { observations } = self.estimation_window {
            if observations < 3 {
                return Err(ConfigError::TooSmall {
                    field: "estimation_window.observations",
                    min: 3,
                    value: observations,
                });
            }
        }
        if self.solver_timeout_ms == Some(0) {
            return Err(ConfigError::NotPositive {
                field: "solver_timeout_ms",
                value: 0.0,
            });
        }
        Ok(())
    }

    pub fn constraints(&self) -> Constraints {
        Constraints {
            allow_short: self.allow_short,
            risk_free_rate: self.risk_free_rate,
        }
    }
}

/// Moving-average crossover settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub fast_window: usize,
    pub slow_window: usize,
    pub average: MovingAverageKind,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            fast_window: 20,
            slow_window: 50,
            average: MovingAverageKind::Sma,
        }
    }
}

impl SignalConfig {
    pub fn new(fast_window: usize, slow_window: usize) -> Self {
        Self {
            fast_window,
            slow_window,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_window == 0 {
            return Err(ConfigError::TooSmall {
                field: "fast_window",
                min: 1,
                value: 0,
            });
        }
        if self.fast_window >= self.slow_window {
            return Err(ConfigError::WindowOrder {
                fast: self.fast_window,
                slow: self.slow_window,
            });
        }
        Ok(())
    }
}

/// How many units an entry buys.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Sizing {
    /// Spend all available cash, fee included.
    #[default]
    AllCash,
    FixedQuantity { quantity: f64 },
    FixedNotional { notional: f64 },
}

/// Backtest simulator settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Proportional cost per transition, in basis points of notional.
    pub fee_bps: f64,
    pub initial_cash: f64,
    pub sizing: Sizing,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            fee_bps: 5.0,
            initial_cash: 100_000.0,
            sizing: Sizing::AllCash,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fee_bps.is_finite() && self.fee_bps >= 0.0) {
            return Err(ConfigError::NotPositive {
                field: "fee_bps",
                value: self.fee_bps,
            });
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "initial_cash",
                value: self.initial_cash,
            });
        }
        match self.sizing {
            Sizing::FixedQuantity { quantity } if !(quantity.is_finite() && quantity > 0.0) => {
                Err(ConfigError::NotPositive {
                    field: "sizing.quantity",
                    value: quantity,
                })
            }
            Sizing::FixedNotional { notional } if !(notional.is_finite() && notional > 0.0) => {
                Err(ConfigError::NotPositive {
                    field: "sizing.notional",
                    value: notional,
                })
            }
            _ => Ok(()),
        }
    }

    /// Fee rate as a fraction of notional.
    pub fn fee_rate(&self) -> f64 {
        self.fee_bps / 10_000.0
    }
}
