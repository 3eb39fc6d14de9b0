//! Rebalance windows: borrowed, half-open slices of a `PriceTable`.
//!
//! A window is derived on demand and never stored. Its exclusive `end` is the
//! rebalance timestamp, so every row a window exposes is dated strictly before
//! the decision it feeds.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

use super::RebalanceFrequency;
use crate::domain::PriceTable;

/// Which rows of history feed estimation for a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimationWindow {
    /// Only the period's own rows (non-overlapping windows).
    Period,
    /// The last `observations` rows before the period boundary (rolling).
    Trailing { observations: usize },
    /// Every row before the period boundary.
    Expanding,
}

impl Default for EstimationWindow {
    fn default() -> Self {
        Self::Period
    }
}

/// A contiguous slice of the price table ending at a rebalance boundary.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    table: &'a PriceTable,
    rows: (usize, usize),
    /// First calendar day of the rebalance period.
    pub period_start: NaiveDate,
    /// Inclusive start of the estimation range.
    pub start: NaiveDate,
    /// Exclusive end; also the rebalance timestamp.
    pub end: NaiveDate,
    /// Rows of history available before `end`, across the whole table.
    pub trailing_rows: usize,
}

impl<'a> Window<'a> {
    /// Decision timestamp for this window.
    pub fn rebalance_date(&self) -> NaiveDate {
        self.end
    }

    pub fn rows(&self) -> Range<usize> {
        self.rows.0..self.rows.1
    }

    pub fn len(&self) -> usize {
        self.rows.1 - self.rows.0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dates(&self) -> &'a [NaiveDate] {
        &self.table.dates()[self.rows()]
    }

    pub fn column(&self, instrument: &str) -> Option<&'a [f64]> {
        let range = self.rows();
        self.table.column(instrument).map(|c| &c[range])
    }

    pub fn instruments(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.table.instruments()
    }

    pub fn table(&self) -> &'a PriceTable {
        self.table
    }
}

/// Lazy sequence of calendar windows over a table, one per non-empty period.
#[derive(Debug, Clone)]
pub struct CalendarWindows<'a> {
    table: &'a PriceTable,
    frequency: RebalanceFrequency,
    estimation: EstimationWindow,
    next_row: usize,
}

impl<'a> CalendarWindows<'a> {
    pub fn new(
        table: &'a PriceTable,
        frequency: RebalanceFrequency,
        estimation: EstimationWindow,
    ) -> Self {
        Self {
            table,
            frequency,
            estimation,
            next_row: 0,
        }
    }
}

impl<'a> Iterator for CalendarWindows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let dates = self.table.dates();
        let first = *dates.get(self.next_row)?;
        let period_start = self.frequency.period_start(first);
        let end = self.frequency.next_boundary(first);
        let period_end_row = self.table.rows_before(end);

        let rows = match self.estimation {
            EstimationWindow::Period => (self.next_row, period_end_row),
            EstimationWindow::Trailing { observations } => {
                (period_end_row.saturating_sub(observations), period_end_row)
            }
            EstimationWindow::Expanding => (0, period_end_row),
        };
        let start = match self.estimation {
            EstimationWindow::Period => period_start,
            _ => dates.get(rows.0).copied().unwrap_or(period_start),
        };

        self.next_row = period_end_row;

        Some(Window {
            table: self.table,
            rows,
            period_start,
            start,
            end,
            trailing_rows: period_end_row,
        })
    }
}

/// Partitions history into rebalance windows and applies the warm-up policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceWindowing {
    pub frequency: RebalanceFrequency,
    pub estimation: EstimationWindow,
    /// Minimum rows of trailing history before a window is eligible.
    pub min_history: usize,
}

impl PriceWindowing {
    pub fn new(
        frequency: RebalanceFrequency,
        estimation: EstimationWindow,
        min_history: usize,
    ) -> Self {
        Self {
            frequency,
            estimation,
            min_history,
        }
    }

    /// Every calendar window, warm-up or not.
    pub fn calendar_windows<'a>(&self, table: &'a PriceTable) -> CalendarWindows<'a> {
        CalendarWindows::new(table, self.frequency, self.estimation)
    }

    /// Windows eligible for optimization.
    ///
    /// Windows whose trailing history is shorter than `min_history` are
    /// skipped silently: no weight, no error.
    pub fn windows<'a>(&self, table: &'a PriceTable) -> EligibleWindows<'a> {
        EligibleWindows {
            inner: self.calendar_windows(table),
            min_history: self.min_history,
        }
    }
}

/// Iterator returned by [`PriceWindowing::windows`].
#[derive(Debug, Clone)]
pub struct EligibleWindows<'a> {
    inner: CalendarWindows<'a>,
    min_history: usize,
}

impl<'a> Iterator for EligibleWindows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for window in self.inner.by_ref() {
            if window.trailing_rows >= self.min_history {
                return Some(window);
            }
            debug!(
                rebalance = %window.end,
                trailing_rows = window.trailing_rows,
                min_history = self.min_history,
                "skipping warm-up window"
            );
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Consecutive calendar days starting 2024-01-01 (weekends included).
    fn daily_table(days: usize) -> PriceTable {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..days)
            .map(|i| base + chrono::Duration::days(i as i64))
            .collect();
        let mut cols = BTreeMap::new();
        cols.insert(
            "A".to_string(),
            (0..days).map(|i| 100.0 + i as f64).collect(),
        );
        PriceTable::new(dates, cols).unwrap()
    }

    #[test]
    fn monthly_windows_partition_history() {
        let table = daily_table(75); // Jan 1 .. Mar 15
        let windows: Vec<_> = table_windows(&table, EstimationWindow::Period, 0);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].len(), 31);
        assert_eq!(windows[1].len(), 29);
        // Last window is a partial period.
        assert_eq!(windows[2].len(), 15);
        assert_eq!(
            windows[0].rebalance_date(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        let total: usize = windows.iter().map(|w| w.len()).sum();
        assert_eq!(total, 75);
    }

    #[test]
    fn windows_never_include_rows_at_or_after_end() {
        let table = daily_table(120);
        for w in table_windows(&table, EstimationWindow::Expanding, 0) {
            assert!(w.dates().iter().all(|d| *d < w.end));
        }
    }

    #[test]
    fn warm_up_windows_are_skipped() {
        let table = daily_table(100);
        assert!(table_windows(&table, EstimationWindow::Period, 252).is_empty());
        let eligible = table_windows(&table, EstimationWindow::Period, 60);
        // Jan (31 rows) and Feb (60 rows) -> only Feb onward qualifies.
        assert_eq!(eligible.len(), 3);
        assert_eq!(eligible[0].trailing_rows, 60);
    }

    #[test]
    fn trailing_window_has_fixed_length() {
        let table = daily_table(120);
        let windows = table_windows(&table, EstimationWindow::Trailing { observations: 40 }, 40);
        assert!(windows.iter().all(|w| w.len() == 40));
    }

    fn table_windows(
        table: &PriceTable,
        estimation: EstimationWindow,
        min_history: usize,
    ) -> Vec<Window<'_>> {
        PriceWindowing::new(RebalanceFrequency::Monthly, estimation, min_history)
            .windows(table)
            .collect()
    }
}
