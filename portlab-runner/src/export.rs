//! Reporting and export: CSV tables and JSON summaries.
//!
//! - **CSV**: weight history, equity curve, trade tape, sweep table
//! - **JSON**: full run results with schema versioning
//!
//! Writers return the text; `save_*` helpers place a fixed set of files in a
//! run directory named after the run id.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use portlab_core::backtest::{EquityPoint, TradeRecord};
use portlab_core::domain::WeightTimeSeries;

use crate::runner::{PortfolioRun, SignalRun, SCHEMA_VERSION};
use crate::sweep::SweepRow;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize any result to pretty JSON.
pub fn export_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize result to JSON")
}

/// Deserialize a `PortfolioRun`, rejecting unknown schema versions.
pub fn import_portfolio_json(json: &str) -> Result<PortfolioRun> {
    let run: PortfolioRun =
        serde_json::from_str(json).context("failed to deserialize PortfolioRun from JSON")?;
    if run.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            run.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(run)
}

/// Deserialize a `SignalRun`, rejecting unknown schema versions.
pub fn import_signal_json(json: &str) -> Result<SignalRun> {
    let run: SignalRun =
        serde_json::from_str(json).context("failed to deserialize SignalRun from JSON")?;
    if run.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            run.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(run)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per rebalance: timestamp, outcome, then one column per instrument.
pub fn export_weights_csv(series: &WeightTimeSeries) -> Result<String> {
    let (dates, columns) = series.to_frame();
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["date".to_string(), "outcome".to_string()];
    header.extend(columns.keys().cloned());
    wtr.write_record(&header)?;

    for (i, (date, entry)) in dates.iter().zip(series.entries()).enumerate() {
        let mut record = vec![date.to_string(), outcome_label(entry.outcome)];
        record.extend(columns.values().map(|col| format!("{:.6}", col[i])));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

fn outcome_label(outcome: portlab_core::domain::RebalanceOutcome) -> String {
    serde_json::to_value(outcome)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Export an equity curve with date, equity, cash and exposure columns.
pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "equity", "cash", "exposure"])?;
    for p in curve {
        wtr.write_record([
            p.date.to_string(),
            format!("{:.2}", p.equity),
            format!("{:.2}", p.cash),
            format!("{:.2}", p.exposure),
        ])?;
    }
    finish(wtr)
}

/// Export a trade list as CSV.
///
/// Columns: instrument, entry_bar, entry_date, entry_price, exit_bar,
/// exit_date, exit_price, quantity, gross_pnl, fees, net_pnl, bars_held,
/// mae, mfe, open
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "instrument",
        "entry_bar",
        "entry_date",
        "entry_price",
        "exit_bar",
        "exit_date",
        "exit_price",
        "quantity",
        "gross_pnl",
        "fees",
        "net_pnl",
        "bars_held",
        "mae",
        "mfe",
        "open",
    ])?;
    for t in trades {
        wtr.write_record([
            t.instrument.clone(),
            t.entry_bar.to_string(),
            t.entry_date.to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_bar.to_string(),
            t.exit_date.to_string(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.quantity),
            format!("{:.2}", t.gross_pnl),
            format!("{:.2}", t.fees),
            format!("{:.2}", t.net_pnl),
            t.bars_held.to_string(),
            format!("{:.2}", t.mae),
            format!("{:.2}", t.mfe),
            t.open.to_string(),
        ])?;
    }
    finish(wtr)
}

/// One row per sweep point with the headline metrics.
pub fn export_sweep_csv(rows: &[&SweepRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "params",
        "run_id",
        "total_return",
        "cagr",
        "sharpe",
        "sortino",
        "max_drawdown",
        "trade_count",
        "total_fees",
    ])?;
    for row in rows {
        let m = &row.metrics;
        wtr.write_record([
            row.params.to_string(),
            row.run_id.clone(),
            format!("{:.6}", m.total_return),
            format!("{:.6}", m.cagr),
            format!("{:.4}", m.sharpe),
            format!("{:.4}", m.sortino),
            format!("{:.6}", m.max_drawdown),
            m.trade_count.to_string(),
            format!("{:.2}", m.total_fees),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundles ───────────────────────────────────────────────

fn run_dir(output_dir: &Path, prefix: &str, run_id: &str) -> Result<PathBuf> {
    let short = run_id.get(..12).unwrap_or(run_id);
    let dir = output_dir.join(format!("{prefix}_{short}"));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    Ok(dir)
}

fn write(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Save `summary.json`, `weights.csv` and `equity.csv` for a portfolio run.
pub fn save_portfolio_artifacts(run: &PortfolioRun, output_dir: &Path) -> Result<PathBuf> {
    let dir = run_dir(output_dir, "portfolio", &run.run_id)?;
    write(&dir, "summary.json", &export_json(run)?)?;
    write(&dir, "weights.csv", &export_weights_csv(&run.weights)?)?;
    write(&dir, "equity.csv", &export_equity_csv(&run.replay.equity_curve)?)?;
    Ok(dir)
}

/// Save `summary.json`, `trades.csv` and `equity.csv` for a signal backtest.
pub fn save_backtest_artifacts(run: &SignalRun, output_dir: &Path) -> Result<PathBuf> {
    let prefix = format!("backtest_{}", run.result.instrument);
    let dir = run_dir(output_dir, &prefix, &run.run_id)?;
    write(&dir, "summary.json", &export_json(run)?)?;
    write(&dir, "trades.csv", &export_trades_csv(&run.result.trades)?)?;
    write(&dir, "equity.csv", &export_equity_csv(&run.result.equity_curve)?)?;
    Ok(dir)
}
