//! Signal events: the contract between signal generation and backtesting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw entry/exit pair for one instrument at one timestamp.
///
/// `entry && exit` is an invalid state. Generators in this crate never produce
/// it; the simulator rejects it when it arrives from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub date: NaiveDate,
    pub entry: bool,
    pub exit: bool,
}

impl SignalEvent {
    pub fn entry(date: NaiveDate) -> Self {
        Self {
            date,
            entry: true,
            exit: false,
        }
    }

    pub fn exit(date: NaiveDate) -> Self {
        Self {
            date,
            entry: false,
            exit: true,
        }
    }

    pub fn none(date: NaiveDate) -> Self {
        Self {
            date,
            entry: false,
            exit: false,
        }
    }

    pub fn is_conflicting(&self) -> bool {
        self.entry && self.exit
    }
}

/// What a crossover rule says at one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalReading {
    /// Not enough history for the current and prior sample of both aggregates.
    Undefined,
    /// Both aggregates defined, no crossing at this sample.
    Quiet,
    Entry,
    Exit,
}

impl SignalReading {
    pub fn is_defined(&self) -> bool {
        !matches!(self, SignalReading::Undefined)
    }
}

/// A generator's reading at one price sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub reading: SignalReading,
}

impl SignalPoint {
    /// Collapse into the raw pair. `Undefined` and `Quiet` both map to no event.
    pub fn to_event(&self) -> SignalEvent {
        match self.reading {
            SignalReading::Entry => SignalEvent::entry(self.date),
            SignalReading::Exit => SignalEvent::exit(self.date),
            SignalReading::Undefined | SignalReading::Quiet => SignalEvent::none(self.date),
        }
    }
}
