//! CLI integration tests against CSV files on disk.
//!
//! Tests cover:
//! - Every subcommand end to end, text and JSON output
//! - Data directory and interval resolution (flag, then `[data]`, then default)
//! - Parameter precedence (defaults, `[strategy.<name>]`, `--set`)
//! - Error paths: unknown strategy, missing data, bad config, bad assignments

mod common;

use clap::Parser;
use common::*;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use stratbench::cli::{execute, Cli};
use stratbench::domain::error::StratbenchError;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let candles = synthetic(400);
    write_csv(dir.path(), "SYN", "1h", &candles);
    write_csv(dir.path(), "SYN", "4h", &resample(&candles, 4));
    dir
}

fn run(args: &[&str]) -> Result<String, StratbenchError> {
    let cli = Cli::try_parse_from(std::iter::once("stratbench").chain(args.iter().copied())).unwrap();
    let mut out = Vec::new();
    execute(&cli, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn run_json(args: &[&str]) -> Value {
    serde_json::from_str(&run(args).unwrap()).unwrap()
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

mod strategies {
    use super::*;

    #[test]
    fn lists_every_builtin() {
        let text = run(&["strategies"]).unwrap();
        for name in ["rsi_mfi", "golden", "ict", "continuation_poi", "volume_breakout"] {
            assert!(text.contains(name), "{name} missing from:\n{text}");
        }
    }

    #[test]
    fn json_carries_defaults() {
        let doc = run_json(&["strategies", "--json"]);
        let list = doc.as_array().unwrap();
        assert_eq!(list.len(), 10);
        let rsi_mfi = list.iter().find(|e| e["name"] == "rsi_mfi").unwrap();
        assert!(rsi_mfi["defaults"].is_object());
        assert!(rsi_mfi["description"].is_string());
    }
}

mod backtest {
    use super::*;

    #[test]
    fn text_report() {
        let dir = data_dir();
        let text = run(&["backtest", "--symbol", "SYN", "--data-dir", path(dir.path())]).unwrap();
        assert!(text.contains("Strategy:       rsi_mfi (SYN 1h)"));
        assert!(text.contains("Candles:        400"));
        assert!(text.contains("Total Trades:"));
        assert!(text.contains("Max Drawdown:"));
    }

    #[test]
    fn json_report_uses_config_balance() {
        let dir = data_dir();
        let ini = write_temp_ini("[backtest]\ninitial_balance = 50000\n");
        let doc = run_json(&[
            "backtest",
            "--symbol",
            "SYN",
            "--data-dir",
            path(dir.path()),
            "-c",
            path(ini.path()),
            "--json",
        ]);
        assert_eq!(doc["symbol"], "SYN");
        assert_eq!(doc["interval"], "1h");
        assert_eq!(doc["result"]["initial_balance"], 50000.0);
        let trades = doc["result"]["total_trades"].as_u64().unwrap();
        assert_eq!(doc["result"]["trades"].as_array().unwrap().len() as u64, trades);
        assert!(doc["metrics"]["exits"].is_object());
    }

    #[test]
    fn set_wins_over_strategy_section() {
        let dir = data_dir();
        let ini = write_temp_ini("[strategy.rsi_mfi]\noversold = 25\noverbought = 80\n");
        let doc = run_json(&[
            "backtest",
            "--symbol",
            "SYN",
            "--data-dir",
            path(dir.path()),
            "-c",
            path(ini.path()),
            "--set",
            "oversold=35",
            "--json",
        ]);
        assert_eq!(doc["params"]["oversold"], 35.0);
        assert_eq!(doc["params"]["overbought"], 80.0);
    }

    #[test]
    fn data_section_supplies_dir_and_interval() {
        let dir = data_dir();
        let ini = write_temp_ini(&format!("[data]\ndir = {}\ninterval = 4h\n", path(dir.path())));
        let doc = run_json(&["backtest", "--symbol", "SYN", "-c", path(ini.path()), "--json"]);
        assert_eq!(doc["interval"], "4h");
    }

    #[test]
    fn flags_win_over_data_section() {
        let dir = data_dir();
        let ini = write_temp_ini("[data]\ndir = /nonexistent/stratbench\ninterval = 4h\n");
        let doc = run_json(&[
            "backtest",
            "--symbol",
            "SYN",
            "--data-dir",
            path(dir.path()),
            "--interval",
            "1h",
            "-c",
            path(ini.path()),
            "--json",
        ]);
        assert_eq!(doc["interval"], "1h");
    }

    #[test]
    fn higher_timeframe_context() {
        let dir = data_dir();
        let text = run(&[
            "backtest",
            "--symbol",
            "SYN",
            "--data-dir",
            path(dir.path()),
            "--htf",
            "4h",
            "-s",
            "continuation_poi",
            "--set",
            "htf_ema_period=20",
        ])
        .unwrap();
        assert!(text.contains("Strategy:       continuation_poi (SYN 1h)"));
    }
}

mod signal_and_scan {
    use super::*;

    #[test]
    fn signal_text_and_json() {
        let dir = data_dir();
        let text = run(&["signal", "--symbol", "SYN", "--data-dir", path(dir.path()), "-s", "ict"]).unwrap();
        assert!(text.starts_with("Status:"));
        assert!(text.contains("Reason:"));

        let doc = run_json(&["signal", "--symbol", "SYN", "--data-dir", path(dir.path()), "--json"]);
        assert!(doc["status"].is_string());
        assert!(doc["reason"].is_string());
    }

    #[test]
    fn scan_markers_are_labelled() {
        let dir = data_dir();
        let doc = run_json(&[
            "scan",
            "--symbol",
            "SYN",
            "--data-dir",
            path(dir.path()),
            "-s",
            "bollinger_bounce",
            "--json",
        ]);
        for marker in doc.as_array().unwrap() {
            let label = marker["label"].as_str().unwrap();
            assert!(label == "BUY" || label == "SELL", "unexpected label {label}");
            assert!(marker["time"].as_i64().unwrap() >= 50 * HOUR_MS);
        }
    }

    #[test]
    fn scan_with_watch_reports_at_least_as_many() {
        let dir = data_dir();
        let base = ["scan", "--symbol", "SYN", "--data-dir", path(dir.path()), "-s", "rsi_mfi", "--json"];
        let entries = run_json(&base);
        let mut with_watch: Vec<&str> = base.to_vec();
        with_watch.push("--include-watch");
        let all = run_json(&with_watch);
        assert!(all.as_array().unwrap().len() >= entries.as_array().unwrap().len());
    }
}

mod optimize {
    use super::*;

    #[test]
    fn custom_axes_and_top() {
        let dir = data_dir();
        let ini = write_temp_ini("[optimizer]\nmin_trades = 0\n");
        let doc = run_json(&[
            "optimize",
            "--symbol",
            "SYN",
            "--data-dir",
            path(dir.path()),
            "-c",
            path(ini.path()),
            "--axis",
            "rsi_period=7,14",
            "--axis",
            "soft_exit=true,false",
            "--top",
            "2",
            "--json",
        ]);
        let shown = doc.as_array().unwrap();
        assert_eq!(shown.len(), 2);
        assert!(shown[0]["score"].as_f64().unwrap() >= shown[1]["score"].as_f64().unwrap());
        assert!(shown[0]["params"]["rsi_period"].is_number());
    }

    #[test]
    fn other_strategies_need_axes() {
        let dir = data_dir();
        let err = run(&["optimize", "--symbol", "SYN", "--data-dir", path(dir.path()), "-s", "golden"]).unwrap_err();
        assert!(matches!(err, StratbenchError::InvalidParam { key, .. } if key == "axis"));
    }

    #[test]
    fn zero_top_is_rejected() {
        let dir = data_dir();
        let err = run(&[
            "optimize",
            "--symbol",
            "SYN",
            "--data-dir",
            path(dir.path()),
            "--axis",
            "rsi_period=14",
            "--top",
            "0",
        ])
        .unwrap_err();
        assert!(matches!(err, StratbenchError::InvalidParam { key, .. } if key == "top"));
    }
}

mod errors {
    use super::*;

    #[test]
    fn unknown_strategy() {
        let dir = data_dir();
        let err = run(&["backtest", "--symbol", "SYN", "--data-dir", path(dir.path()), "-s", "nope"]).unwrap_err();
        assert!(matches!(err, StratbenchError::UnknownStrategy { name } if name == "nope"));
    }

    #[test]
    fn missing_symbol_file() {
        let dir = data_dir();
        let err = run(&["backtest", "--symbol", "ETH", "--data-dir", path(dir.path())]).unwrap_err();
        assert!(matches!(err, StratbenchError::DataSource { .. }));
    }

    #[test]
    fn missing_higher_timeframe_file() {
        let dir = data_dir();
        let err = run(&["signal", "--symbol", "SYN", "--data-dir", path(dir.path()), "--htf", "1d"]).unwrap_err();
        assert!(matches!(err, StratbenchError::DataSource { .. }));
    }

    #[test]
    fn invalid_backtest_config() {
        let dir = data_dir();
        let ini = write_temp_ini("[backtest]\nposition_notional = none\n");
        let err = run(&["backtest", "--symbol", "SYN", "--data-dir", path(dir.path()), "-c", path(ini.path())])
            .unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigInvalid { key, .. } if key == "position_notional"));
    }

    #[test]
    fn missing_config_file() {
        let dir = data_dir();
        let err = run(&[
            "backtest",
            "--symbol",
            "SYN",
            "--data-dir",
            path(dir.path()),
            "-c",
            "/nonexistent/stratbench.ini",
        ])
        .unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigParse { .. }));
    }

    #[test]
    fn malformed_set() {
        let dir = data_dir();
        let err = run(&["signal", "--symbol", "SYN", "--data-dir", path(dir.path()), "--set", "oversold"])
            .unwrap_err();
        assert!(matches!(err, StratbenchError::InvalidParam { .. }));
    }

    #[test]
    fn missing_symbol_is_a_usage_error() {
        assert!(Cli::try_parse_from(["stratbench", "backtest"]).is_err());
    }
}
