//! Configuration validation.
//!
//! Reads the `[backtest]` and `[optimizer]` sections into domain configs. Absent
//! keys keep their defaults; present keys must parse and be in range.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::StratbenchError;
use crate::domain::optimizer::OptimizerConfig;
use crate::ports::config_port::ConfigPort;

pub fn backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, StratbenchError> {
    let d = BacktestConfig::default();
    let initial_balance = read_f64(config, "backtest", "initial_balance")?.unwrap_or(d.initial_balance);
    let position_notional =
        read_f64(config, "backtest", "position_notional")?.unwrap_or(d.position_notional);
    let warmup = read_usize(config, "backtest", "warmup")?.unwrap_or(d.warmup);
    let default_stop_loss_pct =
        read_f64(config, "backtest", "default_stop_loss_pct")?.unwrap_or(d.default_stop_loss_pct);
    let default_reward_risk =
        read_f64(config, "backtest", "default_reward_risk")?.unwrap_or(d.default_reward_risk);

    if initial_balance <= 0.0 {
        return Err(invalid("backtest", "initial_balance", "initial_balance must be positive"));
    }
    if position_notional <= 0.0 {
        return Err(invalid("backtest", "position_notional", "position_notional must be positive"));
    }
    if default_stop_loss_pct <= 0.0 || default_stop_loss_pct >= 100.0 {
        return Err(invalid(
            "backtest",
            "default_stop_loss_pct",
            "default_stop_loss_pct must be between 0 and 100",
        ));
    }
    if default_reward_risk <= 0.0 {
        return Err(invalid("backtest", "default_reward_risk", "default_reward_risk must be positive"));
    }

    Ok(BacktestConfig {
        initial_balance,
        position_notional,
        warmup,
        default_stop_loss_pct,
        default_reward_risk,
    })
}

pub fn optimizer_config(config: &dyn ConfigPort) -> Result<OptimizerConfig, StratbenchError> {
    let d = OptimizerConfig::default();
    Ok(OptimizerConfig {
        backtest: backtest_config(config)?,
        min_trades: read_usize(config, "optimizer", "min_trades")?.unwrap_or(d.min_trades),
    })
}

/// Number of optimizer results to report, at least 1.
pub fn optimizer_top(config: &dyn ConfigPort, default: usize) -> Result<usize, StratbenchError> {
    let top = read_usize(config, "optimizer", "top")?.unwrap_or(default);
    if top == 0 {
        return Err(invalid("optimizer", "top", "top must be at least 1"));
    }
    Ok(top)
}

fn read_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, StratbenchError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, &format!("{key} must be a number, got {raw:?}"))),
        },
    }
}

fn read_usize(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<usize>, StratbenchError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("{key} must be a non-negative integer, got {raw:?}"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> StratbenchError {
    StratbenchError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_gives_defaults() {
        let config = make_config("");
        assert_eq!(backtest_config(&config).unwrap(), BacktestConfig::default());
        assert_eq!(optimizer_config(&config).unwrap(), OptimizerConfig::default());
        assert_eq!(optimizer_top(&config, 3).unwrap(), 3);
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
initial_balance = 50000
position_notional = 2500.5
warmup = 200
default_stop_loss_pct = 1.5
default_reward_risk = 3

[optimizer]
min_trades = 5
top = 10
"#,
        );
        let bt = backtest_config(&config).unwrap();
        assert_eq!(bt.initial_balance, 50_000.0);
        assert_eq!(bt.position_notional, 2500.5);
        assert_eq!(bt.warmup, 200);
        assert_eq!(bt.default_stop_loss_pct, 1.5);
        assert_eq!(bt.default_reward_risk, 3.0);

        let opt = optimizer_config(&config).unwrap();
        assert_eq!(opt.min_trades, 5);
        assert_eq!(opt.backtest, bt);
        assert_eq!(optimizer_top(&config, 3).unwrap(), 10);
    }

    #[test]
    fn initial_balance_must_be_positive() {
        let config = make_config("[backtest]\ninitial_balance = 0\n");
        let err = backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, StratbenchError::ConfigInvalid { key, .. } if key == "initial_balance")
        );
    }

    #[test]
    fn notional_must_be_positive() {
        let config = make_config("[backtest]\nposition_notional = -10\n");
        let err = backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, StratbenchError::ConfigInvalid { key, .. } if key == "position_notional")
        );
    }

    #[test]
    fn non_numeric_value_fails() {
        let config = make_config("[backtest]\ninitial_balance = lots\n");
        let err = backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, StratbenchError::ConfigInvalid { key, .. } if key == "initial_balance")
        );
    }

    #[test]
    fn negative_warmup_fails() {
        let config = make_config("[backtest]\nwarmup = -1\n");
        let err = backtest_config(&config).unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigInvalid { key, .. } if key == "warmup"));
    }

    #[test]
    fn stop_pct_out_of_range_fails() {
        let config = make_config("[backtest]\ndefault_stop_loss_pct = 100\n");
        let err = backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, StratbenchError::ConfigInvalid { key, .. } if key == "default_stop_loss_pct")
        );
    }

    #[test]
    fn reward_risk_zero_fails() {
        let config = make_config("[backtest]\ndefault_reward_risk = 0\n");
        let err = backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, StratbenchError::ConfigInvalid { key, .. } if key == "default_reward_risk")
        );
    }

    #[test]
    fn top_zero_fails() {
        let config = make_config("[optimizer]\ntop = 0\n");
        let err = optimizer_top(&config, 3).unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigInvalid { key, .. } if key == "top"));
    }

    #[test]
    fn bad_min_trades_fails() {
        let config = make_config("[optimizer]\nmin_trades = three\n");
        let err = optimizer_config(&config).unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigInvalid { key, .. } if key == "min_trades"));
    }
}
