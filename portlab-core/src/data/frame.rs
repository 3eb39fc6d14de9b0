//! Columnar boundary: conversion between Polars wide frames and `PriceTable`.
//!
//! Layout: one `date` column (Polars `Date`, or ISO `YYYY-MM-DD` strings) plus
//! one numeric column per instrument. Nulls become `NaN` (missing).
//! No file I/O happens here; readers and writers live in the runner.

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{DataError, PriceTable};

/// Name of the date axis column in wide price frames.
pub const DATE_COLUMN: &str = "date";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("missing 'date' column")]
    MissingDateColumn,

    #[error("null date at row {0}")]
    NullDate(usize),

    #[error("unparseable date '{value}' at row {row}")]
    BadDate { row: usize, value: String },

    #[error("column '{column}' is not numeric: {reason}")]
    NotNumeric { column: String, reason: String },

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Data(#[from] DataError),
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Convert a wide price frame into a validated `PriceTable`.
///
/// Rows are taken in frame order; the table constructor rejects unsorted or
/// duplicated dates rather than silently reordering them.
pub fn table_from_frame(df: &DataFrame) -> Result<PriceTable, FrameError> {
    let date_col = df
        .column(DATE_COLUMN)
        .map_err(|_| FrameError::MissingDateColumn)?;
    let dates = read_dates(date_col)?;

    let mut columns = BTreeMap::new();
    for column in df.get_columns() {
        let name = column.name().to_string();
        if name == DATE_COLUMN {
            continue;
        }
        let as_f64 = column
            .cast(&DataType::Float64)
            .map_err(|e| FrameError::NotNumeric {
                column: name.clone(),
                reason: e.to_string(),
            })?;
        let ca = as_f64.f64().map_err(|e| FrameError::NotNumeric {
            column: name.clone(),
            reason: e.to_string(),
        })?;
        let values: Vec<f64> = ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        columns.insert(name, values);
    }

    Ok(PriceTable::new(dates, columns)?)
}

fn read_dates(column: &Column) -> Result<Vec<NaiveDate>, FrameError> {
    match column.dtype() {
        DataType::Date => {
            let ca = column.date()?;
            let base = epoch();
            (0..ca.len())
                .map(|i| {
                    ca.get(i)
                        .map(|days| base + chrono::Duration::days(days as i64))
                        .ok_or(FrameError::NullDate(i))
                })
                .collect()
        }
        _ => {
            let as_str = column.cast(&DataType::String)?;
            let ca = as_str.str()?;
            (0..ca.len())
                .map(|i| {
                    let raw = ca.get(i).ok_or(FrameError::NullDate(i))?;
                    // Accept plain dates and timestamps with a time suffix.
                    let day = raw.get(..10).unwrap_or(raw);
                    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| FrameError::BadDate {
                        row: i,
                        value: raw.to_string(),
                    })
                })
                .collect()
        }
    }
}

/// Build a wide frame from a date axis and named numeric columns.
pub fn frame_from_columns(
    dates: &[NaiveDate],
    columns: &BTreeMap<String, Vec<f64>>,
) -> Result<DataFrame, FrameError> {
    let base = epoch();
    let days: Vec<i32> = dates.iter().map(|d| (*d - base).num_days() as i32).collect();

    let mut cols = Vec::with_capacity(columns.len() + 1);
    cols.push(Column::new(DATE_COLUMN.into(), days).cast(&DataType::Date)?);
    for (name, values) in columns {
        let values: Vec<Option<f64>> = values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        cols.push(Column::new(name.as_str().into(), values));
    }
    Ok(DataFrame::new(cols)?)
}

/// Convert a `PriceTable` into a wide frame (missing values become nulls).
pub fn frame_from_table(table: &PriceTable) -> Result<DataFrame, FrameError> {
    frame_from_columns(table.dates(), table.columns())
}
