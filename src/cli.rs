//! CLI definition and dispatch.
//!
//! Every command loads candles through the CSV adapter, resolves strategy
//! parameters (registry defaults, then `[strategy.<name>]` from the config
//! file, then `--set`), and writes its result to the given output. Diagnostics
//! go to stderr through `tracing`.

use chrono::DateTime;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::run_backtest_with_context;
use crate::domain::candle::Candle;
use crate::domain::config_validation::{backtest_config, optimizer_config, optimizer_top};
use crate::domain::error::StratbenchError;
use crate::domain::metrics::Metrics;
use crate::domain::optimizer::{default_rsi_mfi_grid, OptimizationResult, Optimizer, ParamGrid};
use crate::domain::scanner::{scan_signals, ScanConfig};
use crate::domain::strategy::params::parse_assignment;
use crate::domain::strategy::{
    bar_span, MarketContext, ParamValue, StrategyParams, StrategyRegistry, StrategyResponse,
    Timeframes,
};
use crate::ports::candle_port::CandlePort;
use crate::ports::config_port::ConfigPort;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_INTERVAL: &str = "1h";
const DEFAULT_STRATEGY: &str = "rsi_mfi";
const DEFAULT_TOP: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "stratbench", about = "Technical-analysis strategy backtester")]
pub struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    #[arg(long)]
    pub symbol: String,
    /// Working timeframe [default: [data] interval, then 1h]
    #[arg(long)]
    pub interval: Option<String>,
    /// Directory of <SYMBOL>_<interval>.csv files [default: [data] dir, then ./data]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Extra timeframe to load as strategy context, e.g. 4h (repeatable)
    #[arg(long = "htf", value_name = "INTERVAL")]
    pub htf: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StrategyArgs {
    #[arg(short, long, default_value = DEFAULT_STRATEGY)]
    pub strategy: String,
    /// Parameter override (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a strategy over the full series
    Backtest {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        strategy: StrategyArgs,
        /// Number of most recent trades to print
        #[arg(long, default_value_t = 5)]
        last: usize,
        #[arg(long)]
        json: bool,
    },
    /// Grid-search strategy parameters
    Optimize {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        strategy: StrategyArgs,
        /// Grid axis as KEY=V1,V2,... (repeatable; default: the RSI/MFI grid)
        #[arg(long = "axis", value_name = "KEY=VALUES")]
        axis: Vec<String>,
        /// Results to print [default: [optimizer] top, then 3]
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// List historical entry signals
    Scan {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        strategy: StrategyArgs,
        #[arg(long)]
        include_watch: bool,
        /// Cap on the candle window handed to the strategy
        #[arg(long)]
        lookback: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a strategy once on the latest candle
    Signal {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        strategy: StrategyArgs,
        #[arg(long)]
        json: bool,
    },
    /// List registered strategies and their default parameters
    Strategies {
        #[arg(long)]
        json: bool,
    },
}

/// Install the stderr subscriber. `RUST_LOG` applies unless `verbose` is set.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match execute(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(cli: &Cli, out: &mut dyn Write) -> Result<(), StratbenchError> {
    match &cli.command {
        Command::Backtest {
            data,
            strategy,
            last,
            json,
        } => run_backtest(data, strategy, *last, *json, out),
        Command::Optimize {
            data,
            strategy,
            axis,
            top,
            json,
        } => run_optimize(data, strategy, axis, *top, *json, out),
        Command::Scan {
            data,
            strategy,
            include_watch,
            lookback,
            json,
        } => run_scan(data, strategy, *include_watch, *lookback, *json, out),
        Command::Signal {
            data,
            strategy,
            json,
        } => run_signal(data, strategy, *json, out),
        Command::Strategies { json } => run_strategies(*json, out),
    }
}

/// Loaded config plus the candles a command works on.
pub struct Session {
    pub config: FileConfigAdapter,
    pub symbol: String,
    pub interval: String,
    pub candles: Vec<Candle>,
    pub timeframes: Timeframes,
}

impl Session {
    pub fn context(&self) -> MarketContext<'_> {
        MarketContext::from_timeframes(&self.timeframes)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, StratbenchError> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)
        }
        None => FileConfigAdapter::from_string(""),
    }
}

pub fn load_session(data: &DataArgs) -> Result<Session, StratbenchError> {
    let config = load_config(data.config.as_deref())?;
    let data_dir = data
        .data_dir
        .clone()
        .or_else(|| config.get_string("data", "dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let interval = data
        .interval
        .clone()
        .or_else(|| config.get_string("data", "interval"))
        .unwrap_or_else(|| DEFAULT_INTERVAL.to_string());

    let port = CsvAdapter::new(data_dir);
    let candles = port.fetch_candles(&data.symbol, &interval)?;
    let mut timeframes = Timeframes::new();
    for label in &data.htf {
        timeframes.insert(label.clone(), port.fetch_candles(&data.symbol, label)?);
    }

    info!(
        symbol = %data.symbol,
        interval = %interval,
        candles = candles.len(),
        timeframes = timeframes.len(),
        "data loaded"
    );
    Ok(Session {
        config,
        symbol: data.symbol.clone(),
        interval,
        candles,
        timeframes,
    })
}

/// Config-file overrides for `strategy`, then `--set` assignments on top.
pub fn resolve_params(
    config: &dyn ConfigPort,
    strategy: &str,
    sets: &[String],
) -> Result<StrategyParams, StratbenchError> {
    let mut params = StrategyParams::from_config(config, &format!("strategy.{strategy}"));
    for raw in sets {
        let (key, value) = parse_assignment(raw)?;
        params.set(&key, value);
    }
    Ok(params)
}

/// Parse `KEY=V1,V2,...` axes into a grid, keeping their order.
pub fn parse_grid(axes: &[String]) -> Result<ParamGrid, StratbenchError> {
    let mut grid = ParamGrid::new();
    for raw in axes {
        let (key, value) = parse_assignment(raw)?;
        let values: Vec<ParamValue> = value
            .to_string()
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ParamValue::parse)
            .collect();
        if values.is_empty() {
            return Err(StratbenchError::InvalidParam {
                key,
                reason: "axis needs at least one value".to_string(),
            });
        }
        grid = grid.axis(&key, values);
    }
    Ok(grid)
}

fn run_backtest(
    data: &DataArgs,
    args: &StrategyArgs,
    last: usize,
    json: bool,
    out: &mut dyn Write,
) -> Result<(), StratbenchError> {
    let session = load_session(data)?;
    let bt_config = backtest_config(&session.config)?;
    let params = resolve_params(&session.config, &args.strategy, &args.set)?;
    let registry = StrategyRegistry::builtin();
    let strategy = registry.try_build(&args.strategy, &params)?;

    let result = run_backtest_with_context(strategy.as_ref(), &session.candles, &session.context(), &bt_config);
    let metrics = Metrics::compute(&result);
    info!(
        strategy = %args.strategy,
        trades = result.total_trades,
        pnl = result.pnl,
        "backtest complete"
    );

    if json {
        let doc = serde_json::json!({
            "symbol": session.symbol,
            "interval": session.interval,
            "strategy": args.strategy,
            "params": params,
            "result": result,
            "metrics": metrics,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        return Ok(());
    }

    writeln!(out, "Strategy:       {} ({} {})", args.strategy, session.symbol, session.interval)?;
    writeln!(out, "Candles:        {}", session.candles.len())?;
    writeln!(out, "Total Trades:   {}", result.total_trades)?;
    writeln!(out, "Win Rate:       {:.2}%", result.win_rate)?;
    writeln!(out, "PnL:            {:+.2}", result.pnl)?;
    writeln!(out, "Final Balance:  {:.2}", result.final_balance)?;
    writeln!(out, "Profit Factor:  {:.2}", metrics.profit_factor)?;
    writeln!(out, "Max Drawdown:   -{:.2}%", metrics.max_drawdown * 100.0)?;

    let skip = result.trades.len().saturating_sub(last);
    if last > 0 && !result.trades.is_empty() {
        writeln!(out, "\nLast {} trades:", result.trades.len() - skip)?;
        for t in &result.trades[skip..] {
            writeln!(
                out,
                "  {:<5} {} @ {:.4} -> {} @ {:.4}  {:+.2} ({:+.2}%)  {}",
                t.side.to_string(),
                fmt_time(t.entry_time),
                t.entry_price,
                fmt_time(t.exit_time),
                t.exit_price,
                t.pnl,
                t.pnl_percent,
                t.exit_reason,
            )?;
        }
    }
    Ok(())
}

fn run_optimize(
    data: &DataArgs,
    args: &StrategyArgs,
    axes: &[String],
    top: Option<usize>,
    json: bool,
    out: &mut dyn Write,
) -> Result<(), StratbenchError> {
    let grid = if axes.is_empty() {
        if args.strategy != DEFAULT_STRATEGY {
            return Err(StratbenchError::InvalidParam {
                key: "axis".to_string(),
                reason: format!("no default grid for {}, pass --axis", args.strategy),
            });
        }
        default_rsi_mfi_grid()
    } else {
        parse_grid(axes)?
    };

    let session = load_session(data)?;
    let config = optimizer_config(&session.config)?;
    let top = match top {
        Some(0) => {
            return Err(StratbenchError::InvalidParam {
                key: "top".to_string(),
                reason: "must be at least 1".to_string(),
            })
        }
        Some(n) => n,
        None => optimizer_top(&session.config, DEFAULT_TOP)?,
    };
    let base = resolve_params(&session.config, &args.strategy, &args.set)?;

    let optimizer = Optimizer::new(&args.strategy, grid).with_config(config);
    let results = optimizer.run(&session.candles, &session.context(), &base, |progress| {
        debug!(completed = progress.completed, total = progress.total, kept = progress.kept, "optimizer progress");
        std::thread::yield_now();
        ControlFlow::Continue(())
    })?;
    let shown: &[OptimizationResult] = &results[..results.len().min(top)];

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(shown)?)?;
        return Ok(());
    }

    writeln!(
        out,
        "{} combinations, {} with enough trades",
        optimizer.grid().len(),
        results.len()
    )?;
    for (rank, r) in shown.iter().enumerate() {
        writeln!(
            out,
            "#{} score {:.2}  trades {}  win {:.1}%  pnl {:+.2}  [{}]",
            rank + 1,
            r.score,
            r.result.total_trades,
            r.result.win_rate,
            r.result.pnl,
            r.params,
        )?;
    }
    Ok(())
}

fn run_scan(
    data: &DataArgs,
    args: &StrategyArgs,
    include_watch: bool,
    lookback: Option<usize>,
    json: bool,
    out: &mut dyn Write,
) -> Result<(), StratbenchError> {
    let session = load_session(data)?;
    let params = resolve_params(&session.config, &args.strategy, &args.set)?;
    let strategy = StrategyRegistry::builtin().try_build(&args.strategy, &params)?;
    let scan_config = ScanConfig {
        warmup: backtest_config(&session.config)?.warmup,
        lookback,
        include_watch,
    };

    let markers = scan_signals(strategy.as_ref(), &session.candles, &session.context(), &scan_config);
    info!(strategy = %args.strategy, markers = markers.len(), "scan complete");

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&markers)?)?;
        return Ok(());
    }
    for m in &markers {
        writeln!(out, "{}  {:<5} {:.4}  {}", fmt_time(m.time), m.label, m.price, m.reason)?;
    }
    Ok(())
}

fn run_signal(
    data: &DataArgs,
    args: &StrategyArgs,
    json: bool,
    out: &mut dyn Write,
) -> Result<(), StratbenchError> {
    let session = load_session(data)?;
    let params = resolve_params(&session.config, &args.strategy, &args.set)?;
    let strategy = StrategyRegistry::builtin().try_build(&args.strategy, &params)?;

    let now = session
        .candles
        .last()
        .map_or(i64::MIN, |c| c.time + bar_span(&session.candles));
    let response = strategy.evaluate(&session.candles, &session.context().as_of(now));

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
        return Ok(());
    }
    write_response(out, &response)
}

fn write_response(out: &mut dyn Write, response: &StrategyResponse) -> Result<(), StratbenchError> {
    writeln!(out, "Status:       {}", response.status)?;
    if let Some(side) = response.side {
        writeln!(out, "Side:         {side}")?;
    }
    let levels = &response.price_levels;
    for (label, value) in [
        ("Entry:       ", levels.entry),
        ("Stop Loss:   ", levels.stop_loss),
        ("Take Profit: ", levels.take_profit),
    ] {
        if let Some(v) = value {
            writeln!(out, "{label} {v:.4}")?;
        }
    }
    writeln!(out, "Reason:       {}", response.reason)?;
    Ok(())
}

fn run_strategies(json: bool, out: &mut dyn Write) -> Result<(), StratbenchError> {
    let registry = StrategyRegistry::builtin();
    if json {
        let list: Vec<_> = registry
            .entries()
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.info.name,
                    "title": e.info.title,
                    "description": e.info.description,
                    "defaults": e.defaults(),
                })
            })
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&list)?)?;
        return Ok(());
    }
    for entry in registry.entries() {
        writeln!(out, "{:<20} {}", entry.info.name, entry.info.title)?;
        writeln!(out, "{:<20} {}", "", entry.info.description)?;
        writeln!(out, "{:<20} {}", "", entry.defaults())?;
    }
    Ok(())
}

fn fmt_time(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_backtest_args() {
        let cli = Cli::try_parse_from([
            "stratbench",
            "backtest",
            "--symbol",
            "BTCUSDT",
            "--set",
            "oversold=25",
            "--set",
            "soft_exit=false",
            "--htf",
            "4h",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Backtest { data, strategy, last, json } = cli.command else {
            panic!("expected backtest");
        };
        assert_eq!(data.symbol, "BTCUSDT");
        assert_eq!(data.htf, vec!["4h"]);
        assert_eq!(strategy.strategy, "rsi_mfi");
        assert_eq!(strategy.set.len(), 2);
        assert_eq!(last, 5);
        assert!(!json);
    }

    #[test]
    fn set_overrides_config_section() {
        let config = FileConfigAdapter::from_string(
            "[strategy.rsi_mfi]\noversold = 25\noverbought = 75\n",
        )
        .unwrap();
        let params = resolve_params(&config, "rsi_mfi", &["oversold=20".to_string()]).unwrap();
        assert_eq!(params.number("oversold", 0.0), 20.0);
        assert_eq!(params.number("overbought", 0.0), 75.0);
    }

    #[test]
    fn bad_assignment_is_invalid_param() {
        let config = FileConfigAdapter::from_string("").unwrap();
        let err = resolve_params(&config, "rsi_mfi", &["oversold".to_string()]).unwrap_err();
        assert!(matches!(err, StratbenchError::InvalidParam { .. }));
    }

    #[test]
    fn grid_axes_parse_in_order() {
        let grid = parse_grid(&["fast_period=10,20".to_string(), "slow_period=50, 100, 200".to_string()])
            .unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.axes()[0].0, "fast_period");
        assert_eq!(grid.axes()[1].1[2], ParamValue::Number(200.0));
        assert!(parse_grid(&["x=".to_string()]).is_err());
    }

    #[test]
    fn fmt_time_is_utc() {
        assert_eq!(fmt_time(0), "1970-01-01 00:00");
        assert_eq!(fmt_time(1_705_329_900_000), "2024-01-15 14:45");
    }
}
