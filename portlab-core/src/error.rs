//! Error taxonomy of the engines, gathered in one place.
//!
//! Each engine owns its error type; this module re-exports them so callers
//! can match on any failure without knowing which module raised it.

pub use crate::backtest::{BacktestError, MalformedInput};
pub use crate::config::ConfigError;
pub use crate::data::FrameError;
pub use crate::domain::{DataError, WeightError};
pub use crate::estimation::EstimationError;
pub use crate::optimizer::OptimizeError;
