//! Price history: single-instrument series and the aligned multi-instrument table.
//!
//! Both types validate on construction and are immutable afterwards. Engines only
//! ever borrow them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::InstrumentId;

/// Malformed price input. Any of these halts a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("timestamps for '{instrument}' are not strictly increasing at {date}")]
    NonMonotonic { instrument: String, date: NaiveDate },

    #[error("duplicate timestamp {date} for '{instrument}'")]
    DuplicateTimestamp { instrument: String, date: NaiveDate },

    #[error("invalid price {price} for '{instrument}' on {date}")]
    InvalidPrice {
        instrument: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("column '{instrument}' has {len} values but the table has {expected} dates")]
    RaggedColumn {
        instrument: String,
        len: usize,
        expected: usize,
    },

    #[error("instrument '{0}' appears more than once")]
    DuplicateInstrument(String),

    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),

    #[error("price table has no instruments")]
    EmptyTable,
}

/// Ordered `(date, price)` observations for one instrument.
///
/// Dates are strictly increasing. Gaps (missing trading days) are allowed and
/// simply absent; no placeholder values are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    instrument: InstrumentId,
    points: Vec<(NaiveDate, f64)>,
}

impl PriceSeries {
    pub fn new(
        instrument: impl Into<InstrumentId>,
        points: Vec<(NaiveDate, f64)>,
    ) -> Result<Self, DataError> {
        let instrument = instrument.into();
        for (i, &(date, price)) in points.iter().enumerate() {
            if !price.is_finite() || price <= 0.0 {
                return Err(DataError::InvalidPrice {
                    instrument,
                    date,
                    price,
                });
            }
            if i > 0 {
                let prev = points[i - 1].0;
                if date == prev {
                    return Err(DataError::DuplicateTimestamp { instrument, date });
                }
                if date < prev {
                    return Err(DataError::NonMonotonic { instrument, date });
                }
            }
        }
        Ok(Self { instrument, points })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|(d, _)| *d)
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|(_, p)| *p).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of `date` in the series, if present.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.points.binary_search_by_key(&date, |(d, _)| *d).ok()
    }
}

/// Wide price table: shared date axis × instrument columns.
///
/// Columns are outer-joined onto the date axis. A missing observation is an
/// explicit `NaN`, never a dropped row and never a forward-filled value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<InstrumentId, Vec<f64>>,
}

impl PriceTable {
    /// Build a table from a date axis and raw columns (`NaN` = missing).
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: BTreeMap<InstrumentId, Vec<f64>>,
    ) -> Result<Self, DataError> {
        if columns.is_empty() {
            return Err(DataError::EmptyTable);
        }
        for w in dates.windows(2) {
            if w[1] == w[0] {
                return Err(DataError::DuplicateTimestamp {
                    instrument: "<table>".into(),
                    date: w[1],
                });
            }
            if w[1] < w[0] {
                return Err(DataError::NonMonotonic {
                    instrument: "<table>".into(),
                    date: w[1],
                });
            }
        }
        for (instrument, values) in &columns {
            if values.len() != dates.len() {
                return Err(DataError::RaggedColumn {
                    instrument: instrument.clone(),
                    len: values.len(),
                    expected: dates.len(),
                });
            }
            for (date, &price) in dates.iter().zip(values) {
                // NaN marks a missing observation; anything else must be a real price.
                if !price.is_nan() && (!price.is_finite() || price <= 0.0) {
                    return Err(DataError::InvalidPrice {
                        instrument: instrument.clone(),
                        date: *date,
                        price,
                    });
                }
            }
        }
        Ok(Self { dates, columns })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Instrument identifiers in deterministic (sorted) order.
    pub fn instruments(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn instrument_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, instrument: &str) -> Option<&[f64]> {
        self.columns.get(instrument).map(|v| v.as_slice())
    }

    pub fn columns(&self) -> &BTreeMap<InstrumentId, Vec<f64>> {
        &self.columns
    }

    /// Number of rows dated strictly before `date`.
    pub fn rows_before(&self, date: NaiveDate) -> usize {
        self.dates.partition_point(|d| *d < date)
    }

    /// One instrument's observations with missing values dropped.
    pub fn series(&self, instrument: &str) -> Result<PriceSeries, DataError> {
        let column = self
            .column(instrument)
            .ok_or_else(|| DataError::UnknownInstrument(instrument.to_string()))?;
        let points = self
            .dates
            .iter()
            .zip(column)
            .filter(|(_, p)| !p.is_nan())
            .map(|(d, p)| (*d, *p))
            .collect();
        PriceSeries::new(instrument, points)
    }

    /// Fraction of missing observations per instrument.
    pub fn missing_rates(&self) -> BTreeMap<InstrumentId, f64> {
        self.columns
            .iter()
            .map(|(k, v)| {
                let missing = v.iter().filter(|p| p.is_nan()).count();
                let rate = if v.is_empty() {
                    0.0
                } else {
                    missing as f64 / v.len() as f64
                };
                (k.clone(), rate)
            })
            .collect()
    }

    /// Copy of the table restricted to rows dated strictly before `date`.
    pub fn truncated_before(&self, date: NaiveDate) -> Self {
        let end = self.rows_before(date);
        Self {
            dates: self.dates[..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v[..end].to_vec()))
                .collect(),
        }
    }
}
