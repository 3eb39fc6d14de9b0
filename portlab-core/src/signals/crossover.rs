//! Moving-average crossover: golden cross enters, death cross exits.
//!
//! Only the current and immediately prior sample are compared. No
//! confirmation, no state: a reading depends on four aggregate values.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SignalConfig};
use crate::domain::{PriceSeries, SignalEvent, SignalPoint, SignalReading};
use crate::indicators::RollingStat;

/// Crossover of two rolling aggregates over one instrument.
#[derive(Debug)]
pub struct CrossoverSignal {
    fast: Box<dyn RollingStat>,
    slow: Box<dyn RollingStat>,
}

impl CrossoverSignal {
    pub fn new(fast: Box<dyn RollingStat>, slow: Box<dyn RollingStat>) -> Self {
        Self { fast, slow }
    }

    pub fn from_config(config: &SignalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            config.average.build(config.fast_window),
            config.average.build(config.slow_window),
        ))
    }

    pub fn name(&self) -> String {
        format!("{}_x_{}", self.fast.name(), self.slow.name())
    }

    /// Samples that are always `Undefined`: warm-up of the slower aggregate
    /// plus the one prior sample a crossing needs.
    pub fn warmup(&self) -> usize {
        self.fast.lookback().max(self.slow.lookback()) + 1
    }

    /// One reading per sample of `series`.
    pub fn generate(&self, series: &PriceSeries) -> SignalSeries {
        let prices = series.prices();
        let readings = self.readings(&prices);
        SignalSeries {
            instrument: series.instrument().to_string(),
            points: series
                .dates()
                .zip(readings)
                .map(|(date, reading)| SignalPoint { date, reading })
                .collect(),
        }
    }

    /// Readings over a raw value column.
    pub fn readings(&self, values: &[f64]) -> Vec<SignalReading> {
        let fast = self.fast.compute(values);
        let slow = self.slow.compute(values);
        (0..values.len())
            .map(|i| crossover_at(&fast, &slow, i))
            .collect()
    }
}

fn crossover_at(fast: &[f64], slow: &[f64], i: usize) -> SignalReading {
    if i == 0 {
        return SignalReading::Undefined;
    }
    let (fast_cur, slow_cur) = (fast[i], slow[i]);
    let (fast_prev, slow_prev) = (fast[i - 1], slow[i - 1]);
    if fast_cur.is_nan() || slow_cur.is_nan() || fast_prev.is_nan() || slow_prev.is_nan() {
        return SignalReading::Undefined;
    }

    if fast_cur > slow_cur && fast_prev <= slow_prev {
        SignalReading::Entry
    } else if fast_cur < slow_cur && fast_prev >= slow_prev {
        SignalReading::Exit
    } else {
        SignalReading::Quiet
    }
}

/// Generator output for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    pub instrument: String,
    pub points: Vec<SignalPoint>,
}

impl SignalSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Raw entry/exit pairs, one per sample.
    pub fn events(&self) -> Vec<SignalEvent> {
        self.points.iter().map(SignalPoint::to_event).collect()
    }

    pub fn first_defined(&self) -> Option<&SignalPoint> {
        self.points.iter().find(|p| p.reading.is_defined())
    }

    pub fn count(&self, reading: SignalReading) -> usize {
        self.points.iter().filter(|p| p.reading == reading).count()
    }
}
