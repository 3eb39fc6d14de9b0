//! Backtesting: signal replay for one instrument, weight replay for a table.

pub mod cost_model;
pub mod replay;
pub mod simulator;
pub mod state;
pub mod trade;

pub use cost_model::CostModel;
pub use replay::{replay_weights, ReplayResult};
pub use simulator::{BacktestResult, BacktestSimulator};
pub use state::{BacktestState, PositionState};
pub use trade::TradeRecord;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input that cannot be simulated at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedInput {
    #[error("signal events are not in strictly increasing date order at {date}")]
    UnorderedEvents { date: NaiveDate },

    #[error("event on {date} has no price for '{instrument}'")]
    UnknownDate { instrument: String, date: NaiveDate },

    #[error("no prices for '{0}'")]
    EmptySeries(String),
}

/// Errors that halt a backtest run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("conflicting entry and exit for '{instrument}' on {date}")]
    ConflictingSignal { instrument: String, date: NaiveDate },

    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInput),
}

/// One mark-to-market observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub cash: f64,
    /// Market value of holdings.
    pub exposure: f64,
}
