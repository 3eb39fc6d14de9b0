//! PortLab CLI: portfolio optimization and signal backtesting commands.
//!
//! Commands:
//! - `optimize`: rolling mean-variance optimization, replayed into an equity curve
//! - `backtest`: moving-average crossover backtest on one instrument
//! - `sweep`: parallel sweep over crossover windows or rebalance frequencies
//! - `inspect`: report the loaded price table (range, coverage, gaps)

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use portlab_core::domain::PriceTable;
use portlab_core::metrics::PerformanceMetrics;
use portlab_core::windowing::RebalanceFrequency;
use portlab_runner::export::export_sweep_csv;
use portlab_runner::runner::load;
use portlab_runner::{
    run_backtest, run_portfolio, save_backtest_artifacts, save_portfolio_artifacts,
    sweep_frequencies, sweep_signals, write_prices, RankBy, RunConfig, SignalGrid, SweepResults,
};

#[derive(Parser)]
#[command(
    name = "portlab",
    about = "PortLab CLI: rolling portfolio optimization and signal backtests"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Config file plus optional date overrides, shared by every command.
#[derive(Args)]
struct DataArgs {
    /// Path to a TOML run config.
    #[arg(long)]
    config: PathBuf,

    /// Override the config's start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Override the config's end date (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl DataArgs {
    fn load_config(&self) -> Result<RunConfig> {
        let mut config = RunConfig::from_file(&self.config)
            .with_context(|| format!("failed to load config {}", self.config.display()))?;
        if self.start.is_some() {
            config.data.start = self.start;
        }
        if self.end.is_some() {
            config.data.end = self.end;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rolling optimizer over every instrument in the data set.
    Optimize {
        #[command(flatten)]
        data: DataArgs,

        /// Override the config's rebalance frequency (weekly, monthly, quarterly, annual).
        #[arg(long)]
        frequency: Option<RebalanceFrequency>,

        /// Output directory for summary.json, weights.csv and equity.csv.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Backtest the configured crossover signal on one instrument.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        /// Instrument to trade.
        #[arg(long)]
        symbol: String,

        /// Output directory for summary.json, trades.csv and equity.csv.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Sweep crossover windows (with --symbol) or rebalance frequencies.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Instrument for a crossover sweep.
        #[arg(long, conflicts_with = "frequencies")]
        symbol: Option<String>,

        /// Short windows, comma separated (e.g. 5,10,20).
        #[arg(long, value_delimiter = ',', requires = "slow")]
        fast: Vec<usize>,

        /// Long windows, comma separated (e.g. 50,100,200).
        #[arg(long, value_delimiter = ',', requires = "fast")]
        slow: Vec<usize>,

        /// Sweep every rebalance frequency instead of crossover windows.
        #[arg(long, default_value_t = false)]
        frequencies: bool,

        /// Ranking metric: sharpe, sortino, cagr, total_return, calmar.
        #[arg(long, default_value = "sharpe")]
        rank: RankBy,

        /// Rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write the full ranked table as CSV.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Summarize the loaded price table.
    Inspect {
        #[command(flatten)]
        data: DataArgs,

        /// Write the loaded (restricted) table to .parquet or .csv.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Print coverage as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Optimize {
            data,
            frequency,
            output_dir,
        } => run_optimize_cmd(&data, frequency, &output_dir),
        Commands::Backtest {
            data,
            symbol,
            output_dir,
        } => run_backtest_cmd(&data, &symbol, &output_dir),
        Commands::Sweep {
            data,
            symbol,
            fast,
            slow,
            frequencies,
            rank,
            top,
            output,
        } => run_sweep_cmd(
            &data,
            symbol.as_deref(),
            fast,
            slow,
            frequencies,
            rank,
            top,
            output.as_deref(),
        ),
        Commands::Inspect { data, export, json } => run_inspect_cmd(&data, export.as_deref(), json),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_optimize_cmd(
    data: &DataArgs,
    frequency: Option<RebalanceFrequency>,
    output_dir: &Path,
) -> Result<()> {
    let mut config = data.load_config()?;
    if let Some(frequency) = frequency {
        config.portfolio.rebalance_frequency = frequency;
    }
    let table = load(&config)?;
    let run = run_portfolio(&config, &table)?;

    println!();
    println!("=== Portfolio Run ===");
    println!("Run ID:         {}", run.run_id);
    println!("Instruments:    {}", run.instruments.join(", "));
    print_period(&table);
    println!(
        "Rebalance:      {} ({} entries)",
        config.portfolio.rebalance_frequency,
        run.weights.len()
    );
    println!(
        "Outcomes:       {} optimized, {} infeasible, {} timed out, {} insufficient",
        run.outcomes.optimized,
        run.outcomes.infeasible,
        run.outcomes.timed_out,
        run.outcomes.insufficient_data
    );
    if let Some(last) = run.weights.entries().last() {
        println!();
        println!("--- Latest Weights ({}) ---", last.timestamp);
        for (instrument, weight) in last.weights.iter().filter(|(_, w)| *w != 0.0) {
            println!("{instrument:<10} {:>8.2}%", weight * 100.0);
        }
        if last.weights.is_zero() {
            println!("(all cash)");
        }
    }
    println!();
    println!("Turnover:       {:.2}x", run.replay.turnover);
    print_metrics(&run.replay.metrics);

    let dir = save_portfolio_artifacts(&run, output_dir)?;
    println!("Artifacts saved to: {}", dir.display());
    Ok(())
}

fn run_backtest_cmd(data: &DataArgs, symbol: &str, output_dir: &Path) -> Result<()> {
    let config = data.load_config()?;
    let table = load(&config)?;
    let run = run_backtest(&config, &table, symbol)?;

    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", run.run_id);
    println!("Instrument:     {}", run.result.instrument);
    println!("Signal:         {} ({} warmup)", run.signal, run.warmup);
    print_period(&table);
    println!("Entries/Exits:  {}/{}", run.entries, run.exits);
    println!("Trades:         {}", run.result.trades.len());
    println!("Final Equity:   {:.2}", run.result.final_equity());
    print_metrics(&run.result.metrics);

    let dir = save_backtest_artifacts(&run, output_dir)?;
    println!("Artifacts saved to: {}", dir.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_sweep_cmd(
    data: &DataArgs,
    symbol: Option<&str>,
    fast: Vec<usize>,
    slow: Vec<usize>,
    frequencies: bool,
    rank: RankBy,
    top: usize,
    output: Option<&Path>,
) -> Result<()> {
    let config = data.load_config()?;
    let table = load(&config)?;

    let results = match (frequencies, symbol) {
        (true, _) => sweep_frequencies(&config, &table, RebalanceFrequency::all())?,
        (false, Some(symbol)) => {
            let grid = if fast.is_empty() {
                SignalGrid::crossover_default()
            } else {
                SignalGrid {
                    fast_windows: fast,
                    slow_windows: slow,
                }
            };
            if grid.size() == 0 {
                bail!("no valid (fast, slow) pairs: every fast window must be below a slow window");
            }
            sweep_signals(&config, &table, symbol, &grid)?
        }
        (false, None) => bail!("one of --symbol or --frequencies is required"),
    };

    info!(points = results.len(), rank = %rank_name(rank), "sweep finished");
    print_leaderboard(&results, rank, top);

    if let Some(path) = output {
        let csv = export_sweep_csv(&results.ranked(rank))?;
        std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Sweep table saved to: {}", path.display());
    }
    Ok(())
}

fn run_inspect_cmd(data: &DataArgs, export: Option<&Path>, json: bool) -> Result<()> {
    let config = data.load_config()?;
    let table = load(&config)?;
    let missing = table.missing_rates();

    if json {
        println!("{}", serde_json::to_string_pretty(&missing)?);
    } else {
        println!();
        println!("=== Price Table ===");
        print_period(&table);
        println!("Rows:           {}", table.len());
        println!("Instruments:    {}", table.instrument_count());
        println!();
        println!("{:<10} {:>10} {:>12} {:>12}", "Symbol", "Missing", "First", "Last");
        println!("{}", "-".repeat(47));
        for (instrument, rate) in &missing {
            let (first, last) = column_range(&table, instrument);
            println!(
                "{instrument:<10} {:>9.2}% {:>12} {:>12}",
                rate * 100.0,
                first,
                last
            );
        }
        println!();
    }

    if let Some(path) = export {
        write_prices(&table, path)?;
        println!("Prices written to: {}", path.display());
    }
    Ok(())
}

/// First and last price of a column, skipping gaps.
fn column_range(table: &PriceTable, instrument: &str) -> (String, String) {
    let Some(col) = table.column(instrument) else {
        return ("-".into(), "-".into());
    };
    let fmt = |v: Option<&f64>| v.map_or_else(|| "-".to_string(), |p| format!("{p:.2}"));
    let mut valid = col.iter().filter(|p| p.is_finite());
    let first = valid.next();
    let last = valid.last().or(first);
    (fmt(first), fmt(last))
}

fn rank_name(rank: RankBy) -> String {
    format!("{rank:?}").to_lowercase()
}

fn print_period(table: &PriceTable) {
    match (table.dates().first(), table.dates().last()) {
        (Some(start), Some(end)) => println!("Period:         {start} to {end}"),
        _ => println!("Period:         (empty)"),
    }
}

fn print_metrics(m: &PerformanceMetrics) {
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Fees:           {:.2}", m.total_fees);
    println!();
}

fn print_leaderboard(results: &SweepResults, rank: RankBy, top: usize) {
    println!();
    println!("=== Sweep ({} points, ranked by {}) ===", results.len(), rank_name(rank));
    println!(
        "{:<4} {:<12} {:>10} {:>8} {:>8} {:>10} {:>7}",
        "#", "Params", "CAGR", "Sharpe", "Sortino", "MaxDD", "Trades"
    );
    println!("{}", "-".repeat(65));
    for (i, row) in results.top_n(rank, top).iter().enumerate() {
        let m = &row.metrics;
        println!(
            "{:<4} {:<12} {:>9.2}% {:>8.3} {:>8.3} {:>9.2}% {:>7}",
            i + 1,
            row.params.to_string(),
            m.cagr * 100.0,
            m.sharpe,
            m.sortino,
            m.max_drawdown * 100.0,
            m.trade_count
        );
    }
    println!();
}
