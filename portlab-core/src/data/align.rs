//! Multi-instrument time alignment.
//!
//! Given one series per instrument, align them to a common timeline.
//! Missing observations get strict NaN (no forward-fill of price data).

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::{DataError, PriceSeries, PriceTable};

/// Outer-join several price series onto the union of their dates.
///
/// For each date in the union, each instrument either has a real price or
/// gets `NaN`. Passing the same instrument twice is malformed input.
pub fn align_series(series: &[PriceSeries]) -> Result<PriceTable, DataError> {
    let mut all_dates = BTreeSet::new();
    for s in series {
        all_dates.extend(s.dates());
    }
    let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for s in series {
        let by_date: HashMap<NaiveDate, f64> = s.points().iter().copied().collect();
        let column: Vec<f64> = dates
            .iter()
            .map(|d| by_date.get(d).copied().unwrap_or(f64::NAN))
            .collect();
        if columns.insert(s.instrument().to_string(), column).is_some() {
            return Err(DataError::DuplicateInstrument(s.instrument().to_string()));
        }
    }

    PriceTable::new(dates, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn align_fills_missing_with_nan() {
        let spy = PriceSeries::new(
            "SPY",
            vec![
                (d("2024-01-02"), 100.0),
                (d("2024-01-03"), 101.0),
                (d("2024-01-04"), 102.0),
            ],
        )
        .unwrap();
        let qqq = PriceSeries::new(
            "QQQ",
            vec![(d("2024-01-02"), 200.0), (d("2024-01-04"), 202.0)],
        )
        .unwrap();

        let table = align_series(&[spy, qqq]).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.column("SPY").unwrap()[1], 101.0);
        assert!(table.column("QQQ").unwrap()[1].is_nan());
    }

    #[test]
    fn single_series_no_alignment_needed() {
        let spy = PriceSeries::new("SPY", vec![(d("2024-01-02"), 100.0)]).unwrap();
        let table = align_series(&[spy]).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.column("SPY").unwrap()[0], 100.0);
    }

    #[test]
    fn duplicate_instrument_is_rejected() {
        let a = PriceSeries::new("SPY", vec![(d("2024-01-02"), 100.0)]).unwrap();
        assert!(align_series(&[a.clone(), a]).is_err());
    }
}
