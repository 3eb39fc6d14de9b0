//! Domain types for PortLab

pub mod price;
pub mod signal;
pub mod weights;

pub use price::{DataError, PriceSeries, PriceTable};
pub use signal::{SignalEvent, SignalPoint, SignalReading};
pub use weights::{
    RebalanceEntry, RebalanceOutcome, WeightError, WeightTimeSeries, WeightVector,
    WEIGHT_SUM_TOLERANCE,
};

/// Instrument identifier (ticker).
pub type InstrumentId = String;
