//! Price loading for the runner.
//!
//! Given a `[data]` section, produces one validated `PriceTable`:
//! 1. If `path` is set → read a wide Parquet or CSV file through Polars
//! 2. If `synthetic` is set → generate deterministic random walks per symbol
//!
//! The table is then restricted to the requested symbols and date range.
//! Synthetic data is a developer-only mode for demos and tests.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use portlab_core::data::{align_series, frame_from_table, table_from_frame};
use portlab_core::domain::{PriceSeries, PriceTable};
use portlab_core::error::{DataError, FrameError};

use crate::config::DataConfig;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported price file '{0}' (expected .parquet or .csv)")]
    UnsupportedFormat(PathBuf),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("no price rows between {start:?} and {end:?}")]
    EmptyRange {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },

    #[error("no data source configured")]
    NoSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Parquet,
    Csv,
}

fn detect_format(path: &Path) -> Result<FileFormat, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("parquet") | Some("pq") => Ok(FileFormat::Parquet),
        Some("csv") => Ok(FileFormat::Csv),
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Resolve a `[data]` section into a table.
pub fn load_table(config: &DataConfig) -> Result<PriceTable, LoadError> {
    let table = match (&config.path, config.synthetic.is_empty()) {
        (Some(path), _) => read_prices(path)?,
        (None, false) => {
            let (Some(start), Some(end)) = (config.start, config.end) else {
                return Err(LoadError::EmptyRange {
                    start: config.start,
                    end: config.end,
                });
            };
            warn!(
                symbols = config.synthetic.len(),
                "generating synthetic prices; results are not market data"
            );
            synthetic_table(&config.synthetic, start, end)?
        }
        (None, true) => return Err(LoadError::NoSource),
    };
    let restricted = restrict(&table, &config.symbols, config.start, config.end)?;
    info!(
        instruments = restricted.instrument_count(),
        rows = restricted.len(),
        "prices loaded"
    );
    Ok(restricted)
}

/// Read a wide price file: a `date` column plus one numeric column per instrument.
pub fn read_prices(path: &Path) -> Result<PriceTable, LoadError> {
    let format = detect_format(path)?;
    let df = match format {
        FileFormat::Parquet => {
            let file = File::open(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            ParquetReader::new(file).finish()?
        }
        FileFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
    };
    debug!(path = %path.display(), rows = df.height(), columns = df.width(), "price file read");
    Ok(table_from_frame(&df)?)
}

/// Write a table in the same wide layout `read_prices` accepts.
pub fn write_prices(table: &PriceTable, path: &Path) -> Result<(), LoadError> {
    let format = detect_format(path)?;
    let mut df = frame_from_table(table)?;
    let mut file = File::create(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match format {
        FileFormat::Parquet => {
            ParquetWriter::new(&mut file).finish(&mut df)?;
        }
        FileFormat::Csv => {
            CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        }
    }
    Ok(())
}

/// Keep `symbols` (all when empty) and rows within `[start, end]`.
pub fn restrict(
    table: &PriceTable,
    symbols: &[String],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<PriceTable, LoadError> {
    let dates = table.dates();
    let lo = start.map_or(0, |s| dates.partition_point(|d| *d < s));
    let hi = end.map_or(dates.len(), |e| dates.partition_point(|d| *d <= e));
    if lo >= hi {
        return Err(LoadError::EmptyRange { start, end });
    }

    let mut columns = BTreeMap::new();
    if symbols.is_empty() {
        for (id, column) in table.columns() {
            columns.insert(id.clone(), column[lo..hi].to_vec());
        }
    } else {
        for id in symbols {
            let column = table
                .column(id)
                .ok_or_else(|| DataError::UnknownInstrument(id.clone()))?;
            columns.insert(id.clone(), column[lo..hi].to_vec());
        }
    }
    Ok(PriceTable::new(dates[lo..hi].to_vec(), columns)?)
}

/// Generate synthetic prices for testing/development.
///
/// Produces a random walk from a starting price of 100.0, seeded from the
/// symbol so the same symbol always yields the same path. Weekends are skipped.
pub fn synthetic_series(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceSeries, DataError> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // Deterministic seed from symbol name
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    // Per-symbol drift and volatility so walks are distinguishable.
    let drift: f64 = rng.gen_range(-0.0002..0.0008);
    let vol: f64 = rng.gen_range(0.005..0.02);

    let mut points = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;
    while current <= end {
        let weekday = current.weekday();
        if weekday != chrono::Weekday::Sat && weekday != chrono::Weekday::Sun {
            let shock: f64 = rng.gen_range(-1.0..1.0);
            price *= 1.0 + drift + vol * shock;
            points.push((current, price));
        }
        current += chrono::Duration::days(1);
    }
    PriceSeries::new(symbol, points)
}

/// Synthetic series for each symbol, aligned into one table.
pub fn synthetic_table(
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceTable, DataError> {
    let series = symbols
        .iter()
        .map(|s| synthetic_series(s, start, end))
        .collect::<Result<Vec<_>, _>>()?;
    align_series(&series)
}

/// Deterministic BLAKE3 hash over a table's dates and prices.
pub fn dataset_hash(table: &PriceTable) -> String {
    let mut hasher = blake3::Hasher::new();
    for date in table.dates() {
        hasher.update(date.to_string().as_bytes());
    }
    for (id, column) in table.columns() {
        hasher.update(id.as_bytes());
        for p in column {
            hasher.update(&p.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
