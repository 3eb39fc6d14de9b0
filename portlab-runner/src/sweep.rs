//! Parameter sweeps over crossover windows and rebalance frequencies.
//!
//! Every grid point borrows the same read-only table and runs independently,
//! so points fan out over rayon with no shared mutable state.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use portlab_core::domain::PriceTable;
use portlab_core::metrics::PerformanceMetrics;
use portlab_core::windowing::RebalanceFrequency;

use crate::config::{RunConfig, RunId};
use crate::runner::{run_backtest, run_portfolio, RunError};

/// Crossover window grid.
///
/// Pairs with `fast >= slow` are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalGrid {
    pub fast_windows: Vec<usize>,
    pub slow_windows: Vec<usize>,
}

impl SignalGrid {
    /// Short windows: 5, 10, 20, 50. Long windows: 50, 100, 200.
    pub fn crossover_default() -> Self {
        Self {
            fast_windows: vec![5, 10, 20, 50],
            slow_windows: vec![50, 100, 200],
        }
    }

    /// Valid `(fast, slow)` pairs in grid order.
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &fast in &self.fast_windows {
            for &slow in &self.slow_windows {
                if fast > 0 && fast < slow {
                    pairs.push((fast, slow));
                }
            }
        }
        pairs
    }

    pub fn size(&self) -> usize {
        self.pairs().len()
    }
}

/// What a sweep row varied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SweepParams {
    Crossover { fast: usize, slow: usize },
    Rebalance { frequency: RebalanceFrequency },
}

impl fmt::Display for SweepParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crossover { fast, slow } => write!(f, "{fast}/{slow}"),
            Self::Rebalance { frequency } => write!(f, "{frequency}"),
        }
    }
}

/// One grid point's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRow {
    pub run_id: RunId,
    pub params: SweepParams,
    pub metrics: PerformanceMetrics,
}

/// Metric used to rank sweep rows (higher is better for all of them).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    Sharpe,
    Sortino,
    Cagr,
    TotalReturn,
    Calmar,
}

impl RankBy {
    pub fn score(&self, m: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => m.sharpe,
            Self::Sortino => m.sortino,
            Self::Cagr => m.cagr,
            Self::TotalReturn => m.total_return,
            Self::Calmar => m.calmar,
        }
    }
}

impl FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "sharpe" => Ok(Self::Sharpe),
            "sortino" => Ok(Self::Sortino),
            "cagr" => Ok(Self::Cagr),
            "total_return" | "return" => Ok(Self::TotalReturn),
            "calmar" => Ok(Self::Calmar),
            other => Err(format!("unknown ranking metric '{other}'")),
        }
    }
}

/// Results from a sweep, in grid order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResults {
    rows: Vec<SweepRow>,
}

impl SweepResults {
    pub fn new(rows: Vec<SweepRow>) -> Self {
        Self { rows }
    }

    pub fn all(&self) -> &[SweepRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows sorted by `rank` (descending). NaN scores sort last.
    pub fn ranked(&self, rank: RankBy) -> Vec<&SweepRow> {
        let mut sorted: Vec<_> = self.rows.iter().collect();
        sorted.sort_by(|a, b| {
            let (sa, sb) = (rank.score(&a.metrics), rank.score(&b.metrics));
            match (sa.is_nan(), sb.is_nan()) {
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                _ => sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal),
            }
        });
        sorted
    }

    pub fn top_n(&self, rank: RankBy, n: usize) -> Vec<&SweepRow> {
        self.ranked(rank).into_iter().take(n).collect()
    }

    pub fn best(&self, rank: RankBy) -> Option<&SweepRow> {
        self.ranked(rank).into_iter().next()
    }
}

/// Backtest every `(fast, slow)` pair of `grid` on one instrument.
pub fn sweep_signals(
    base: &RunConfig,
    table: &PriceTable,
    instrument: &str,
    grid: &SignalGrid,
) -> Result<SweepResults, RunError> {
    let pairs = grid.pairs();
    info!(instrument, points = pairs.len(), "crossover sweep started");

    let rows = pairs
        .par_iter()
        .map(|&(fast, slow)| {
            let mut config = base.clone();
            config.signal.fast_window = fast;
            config.signal.slow_window = slow;
            let run = run_backtest(&config, table, instrument)?;
            debug!(fast, slow, sharpe = run.result.metrics.sharpe, "sweep point done");
            Ok(SweepRow {
                run_id: run.run_id,
                params: SweepParams::Crossover { fast, slow },
                metrics: run.result.metrics,
            })
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    Ok(SweepResults::new(rows))
}

/// Run the portfolio engine once per rebalance frequency.
pub fn sweep_frequencies(
    base: &RunConfig,
    table: &PriceTable,
    frequencies: &[RebalanceFrequency],
) -> Result<SweepResults, RunError> {
    info!(points = frequencies.len(), "rebalance frequency sweep started");

    let rows = frequencies
        .par_iter()
        .map(|&frequency| {
            let mut config = base.clone();
            config.portfolio.rebalance_frequency = frequency;
            let run = run_portfolio(&config, table)?;
            debug!(%frequency, sharpe = run.replay.metrics.sharpe, "sweep point done");
            Ok(SweepRow {
                run_id: run.run_id,
                params: SweepParams::Rebalance { frequency },
                metrics: run.replay.metrics,
            })
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    Ok(SweepResults::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::synthetic_table;
    use chrono::NaiveDate;

    fn base() -> (RunConfig, PriceTable) {
        let mut config = RunConfig::default();
        config.data.synthetic = vec!["AAA".into(), "BBB".into()];
        config.data.start = NaiveDate::from_ymd_opt(2019, 1, 1);
        config.data.end = NaiveDate::from_ymd_opt(2021, 6, 30);
        config.portfolio.min_history_days = 60;
        let table = synthetic_table(
            &config.data.synthetic,
            NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 6, 30).unwrap(),
        )
        .unwrap();
        (config, table)
    }

    #[test]
    fn grid_filters_invalid_combinations() {
        let grid = SignalGrid {
            fast_windows: vec![10, 50, 100],
            slow_windows: vec![50, 100],
        };
        // Valid: (10,50), (10,100), (50,100)
        assert_eq!(grid.pairs(), vec![(10, 50), (10, 100), (50, 100)]);
        assert_eq!(grid.size(), 3);
    }

    #[test]
    fn signal_sweep_covers_grid_with_distinct_run_ids() {
        let (config, table) = base();
        let grid = SignalGrid {
            fast_windows: vec![5, 10],
            slow_windows: vec![20, 40],
        };
        let results = sweep_signals(&config, &table, "AAA", &grid).unwrap();
        assert_eq!(results.len(), 4);
        let mut ids: Vec<_> = results.all().iter().map(|r| r.run_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn frequency_sweep_is_ranked_descending() {
        let (config, table) = base();
        let results = sweep_frequencies(&config, &table, RebalanceFrequency::all()).unwrap();
        assert_eq!(results.len(), 4);
        let ranked = results.ranked(RankBy::Sharpe);
        for pair in ranked.windows(2) {
            assert!(pair[0].metrics.sharpe >= pair[1].metrics.sharpe);
        }
    }

    #[test]
    fn rank_by_parses_aliases() {
        assert_eq!("total-return".parse::<RankBy>(), Ok(RankBy::TotalReturn));
        assert_eq!("CAGR".parse::<RankBy>(), Ok(RankBy::Cagr));
        assert!("alpha".parse::<RankBy>().is_err());
    }
}
