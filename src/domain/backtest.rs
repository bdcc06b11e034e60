//! Single-position backtest simulator.
//!
//! The strategy is replayed over every growing prefix of the series after the
//! warm-up. Entries fill at the signalling candle's close; from the next candle
//! on the open position is checked against its stop, then its target, then an
//! exit signal. Stake size is a fixed notional and the balance only accumulates
//! realised PnL, without fees or slippage.

use serde::Serialize;
use tracing::debug;

use crate::domain::candle::Candle;
use crate::domain::position::{ExitReason, Position, TradeRecord};
use crate::domain::strategy::{
    bar_span, MarketContext, PriceLevels, Side, Status, Strategy, StrategyResponse, Timeframes,
};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    /// Stake per trade in quote currency.
    pub position_notional: f64,
    /// Candles skipped before the first evaluation.
    pub warmup: usize,
    /// Stop distance in percent used when an entry carries no usable stop.
    pub default_stop_loss_pct: f64,
    /// Target distance as a multiple of risk when an entry carries no usable target.
    pub default_reward_risk: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_balance: 10_000.0,
            position_notional: 1_000.0,
            warmup: 50,
            default_stop_loss_pct: 2.0,
            default_reward_risk: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub total_trades: usize,
    /// Winning trades as a percentage of all trades.
    pub win_rate: f64,
    pub pnl: f64,
    pub trades: Vec<TradeRecord>,
    pub initial_balance: f64,
    pub final_balance: f64,
}

impl BacktestResult {
    /// Net PnL as a percentage of the initial balance.
    pub fn roi_pct(&self) -> f64 {
        if self.initial_balance > 0.0 {
            self.pnl / self.initial_balance * 100.0
        } else {
            0.0
        }
    }

    fn from_trades(trades: Vec<TradeRecord>, initial_balance: f64) -> Self {
        let total_trades = trades.len();
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let win_rate = if total_trades > 0 {
            wins as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };
        BacktestResult {
            total_trades,
            win_rate,
            pnl,
            trades,
            initial_balance,
            final_balance: initial_balance + pnl,
        }
    }
}

/// Backtest without higher-timeframe data.
pub fn run_backtest(strategy: &dyn Strategy, candles: &[Candle], config: &BacktestConfig) -> BacktestResult {
    run_backtest_with_context(strategy, candles, &MarketContext::new(), config)
}

/// Backtest against owned higher-timeframe series.
pub fn run_backtest_with_timeframes(
    strategy: &dyn Strategy,
    candles: &[Candle],
    timeframes: &Timeframes,
    config: &BacktestConfig,
) -> BacktestResult {
    run_backtest_with_context(strategy, candles, &MarketContext::from_timeframes(timeframes), config)
}

/// Backtest with a higher-timeframe context. At candle `i` the strategy only
/// sees context candles that had closed by the end of candle `i`.
pub fn run_backtest_with_context(
    strategy: &dyn Strategy,
    candles: &[Candle],
    context: &MarketContext<'_>,
    config: &BacktestConfig,
) -> BacktestResult {
    let n = candles.len();
    let span = bar_span(candles);
    let notional = config.position_notional;
    let mut position: Option<Position> = None;
    let mut trades = Vec::new();

    for i in config.warmup.min(n)..n {
        let candle = &candles[i];
        let evaluate = || strategy.evaluate(&candles[..=i], &context.as_of(candle.time + span));

        if let Some(pos) = position.take() {
            let exit = if pos.should_stop_loss(candle.low, candle.high) {
                Some((pos.stop_loss, ExitReason::StopLoss))
            } else if pos.should_take_profit(candle.low, candle.high) {
                Some((pos.take_profit, ExitReason::TakeProfit))
            } else {
                let response = evaluate();
                let closes_side = response.side.is_none_or(|side| side == pos.side);
                (response.status == Status::Exit && closes_side)
                    .then_some((candle.close, ExitReason::Signal))
            };

            match exit {
                Some((price, reason)) => {
                    let trade = pos.close(candle.time, price, notional, reason);
                    debug!(
                        side = %trade.side,
                        entry = trade.entry_price,
                        exit = trade.exit_price,
                        pnl = trade.pnl,
                        reason = %trade.exit_reason,
                        "closed position"
                    );
                    trades.push(trade);
                }
                None => position = Some(pos),
            }
            continue;
        }

        // an entry on the final candle would have no bar left to play out
        if i + 1 == n {
            break;
        }
        let response = evaluate();
        if response.status == Status::Entry {
            let pos = open_position(&response, candle, config);
            debug!(
                strategy = strategy.name(),
                side = %pos.side,
                entry = pos.entry_price,
                stop_loss = pos.stop_loss,
                take_profit = pos.take_profit,
                time = pos.entry_time,
                reason = %response.reason,
                "opened position"
            );
            position = Some(pos);
        }
    }

    if let (Some(pos), Some(last)) = (position, candles.last()) {
        trades.push(pos.close(last.time, last.close, notional, ExitReason::EndOfData));
    }

    let result = BacktestResult::from_trades(trades, config.initial_balance);
    debug!(
        strategy = strategy.name(),
        candles = n,
        trades = result.total_trades,
        win_rate = result.win_rate,
        pnl = result.pnl,
        "backtest finished"
    );
    result
}

/// Fill at the candle close, repairing levels that are missing or on the wrong
/// side of the fill.
fn open_position(response: &StrategyResponse, candle: &Candle, config: &BacktestConfig) -> Position {
    let side = response.side.unwrap_or(Side::Long);
    let entry = candle.close;
    let sign = side.sign();
    let PriceLevels { stop_loss, take_profit, .. } = response.price_levels;

    let stop_loss = stop_loss
        .filter(|s| s.is_finite() && sign * (entry - s) > 0.0)
        .unwrap_or(entry * (1.0 - sign * config.default_stop_loss_pct / 100.0));
    let take_profit = take_profit
        .filter(|t| t.is_finite() && sign * (t - entry) > 0.0)
        .unwrap_or(entry + sign * (entry - stop_loss).abs() * config.default_reward_risk);

    Position {
        side,
        entry_price: entry,
        entry_time: candle.time,
        stop_loss,
        take_profit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::testing::{candle, flat, HOUR_MS};

    fn config() -> BacktestConfig {
        BacktestConfig {
            warmup: 5,
            ..BacktestConfig::default()
        }
    }

    fn long_at_10(window: &[Candle], _: &MarketContext<'_>) -> StrategyResponse {
        if window.len() == 11 {
            let close = window[10].close;
            StrategyResponse::entry(
                Side::Long,
                PriceLevels::new(close, close - 5.0, close + 5.0),
                "scripted",
            )
        } else {
            StrategyResponse::idle("wait")
        }
    }

    fn bare_long_at_10(window: &[Candle], _: &MarketContext<'_>) -> StrategyResponse {
        if window.len() == 11 {
            StrategyResponse::entry(Side::Long, PriceLevels::default(), "scripted")
        } else {
            StrategyResponse::idle("wait")
        }
    }

    fn short_at_10_exit_at_14(window: &[Candle], _: &MarketContext<'_>) -> StrategyResponse {
        match window.len() {
            11 => StrategyResponse::entry(Side::Short, PriceLevels::default(), "scripted"),
            15 => StrategyResponse::exit(None, "done"),
            _ => StrategyResponse::idle("wait"),
        }
    }

    fn always_long(window: &[Candle], _: &MarketContext<'_>) -> StrategyResponse {
        let close = window[window.len() - 1].close;
        StrategyResponse::entry(Side::Long, PriceLevels::new(close, close - 5.0, close + 5.0), "always")
    }

    #[test]
    fn no_candles_no_trades() {
        let r = run_backtest(&long_at_10, &[], &config());
        assert_eq!(r.total_trades, 0);
        assert_eq!(r.win_rate, 0.0);
        assert_eq!(r.final_balance, 10_000.0);
    }

    #[test]
    fn take_profit_exit() {
        let mut candles = flat(20, 100.0);
        candles[12] = candle(12, 100.0, 106.0, 99.0, 104.0, 1000.0);
        let r = run_backtest(&long_at_10, &candles, &config());
        assert_eq!(r.total_trades, 1);
        let t = &r.trades[0];
        assert_eq!(t.exit_reason, ExitReason::TakeProfit);
        assert_eq!(t.exit_price, 105.0);
        assert_eq!(t.entry_time, 10 * HOUR_MS);
        assert_eq!(t.exit_time, 12 * HOUR_MS);
        assert!((r.pnl - 50.0).abs() < 1e-9);
        assert_eq!(r.win_rate, 100.0);
        assert!((r.final_balance - 10_050.0).abs() < 1e-9);
    }

    #[test]
    fn stop_wins_when_both_levels_touched() {
        let mut candles = flat(20, 100.0);
        candles[11] = candle(11, 100.0, 106.0, 94.0, 101.0, 1000.0);
        let r = run_backtest(&long_at_10, &candles, &config());
        let t = &r.trades[0];
        assert_eq!(t.exit_reason, ExitReason::StopLoss);
        assert_eq!(t.exit_price, 95.0);
        assert!((t.pnl + 50.0).abs() < 1e-9);
        assert_eq!(r.win_rate, 0.0);
    }

    #[test]
    fn entry_bar_range_is_not_checked() {
        let mut candles = flat(20, 100.0);
        candles[10] = candle(10, 100.0, 120.0, 80.0, 100.0, 1000.0);
        let r = run_backtest(&long_at_10, &candles, &config());
        assert_eq!(r.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(r.trades[0].exit_time, 19 * HOUR_MS);
    }

    #[test]
    fn missing_levels_use_defaults() {
        let mut candles = flat(20, 100.0);
        candles[13] = candle(13, 100.0, 100.5, 97.5, 98.0, 1000.0);
        let r = run_backtest(&bare_long_at_10, &candles, &config());
        let t = &r.trades[0];
        assert_eq!(t.exit_reason, ExitReason::StopLoss);
        assert!((t.exit_price - 98.0).abs() < 1e-9);

        let mut candles = flat(20, 100.0);
        candles[13] = candle(13, 100.0, 104.5, 99.5, 104.0, 1000.0);
        let r = run_backtest(&bare_long_at_10, &candles, &config());
        assert_eq!(r.trades[0].exit_reason, ExitReason::TakeProfit);
        assert!((r.trades[0].exit_price - 104.0).abs() < 1e-9);
    }

    #[test]
    fn short_exit_signal_closes_at_close() {
        let mut candles = flat(20, 100.0);
        candles[14] = candle(14, 100.0, 100.4, 96.5, 97.0, 1000.0);
        let r = run_backtest(&short_at_10_exit_at_14, &candles, &config());
        let t = &r.trades[0];
        assert_eq!(t.side, Side::Short);
        assert_eq!(t.exit_reason, ExitReason::Signal);
        assert_eq!(t.exit_price, 97.0);
        assert!((t.pnl - 30.0).abs() < 1e-9);
        assert!((t.pnl_percent - 3.0).abs() < 1e-9);
    }

    #[test]
    fn one_position_at_a_time() {
        let mut candles = flat(30, 100.0);
        candles[8] = candle(8, 100.0, 100.0, 94.0, 95.0, 1000.0);
        candles[20] = candle(20, 100.0, 106.0, 100.0, 100.0, 1000.0);
        let r = run_backtest(&always_long, &candles, &config());

        // entry at 5 stopped at 8, re-entry at 9 closed by target at 20, then 21 to the end
        assert_eq!(r.total_trades, 3);
        for pair in r.trades.windows(2) {
            assert!(pair[1].entry_time > pair[0].exit_time);
        }
        for t in &r.trades {
            assert!(t.exit_time > t.entry_time);
        }
        assert_eq!(r.trades[2].exit_reason, ExitReason::EndOfData);
    }

    #[test]
    fn no_entry_on_final_candle() {
        let candles = flat(11, 100.0);
        let r = run_backtest(&long_at_10, &candles, &config());
        assert_eq!(r.total_trades, 0);
    }

    #[test]
    fn warmup_longer_than_series() {
        let r = run_backtest(&always_long, &flat(10, 100.0), &BacktestConfig::default());
        assert_eq!(r.total_trades, 0);
    }

    fn sees_only_closed_htf(window: &[Candle], ctx: &MarketContext<'_>) -> StrategyResponse {
        let now = window[window.len() - 1].time + HOUR_MS;
        let htf = ctx.get("4h").unwrap_or_default();
        assert!(htf.iter().all(|c| c.time + 4 * HOUR_MS <= now));
        StrategyResponse::idle(htf.len().to_string())
    }

    #[test]
    fn context_is_truncated_to_closed_candles() {
        let candles = flat(40, 100.0);
        let htf: Vec<Candle> = (0..10)
            .map(|i| Candle { time: i as i64 * 4 * HOUR_MS, ..candles[0] })
            .collect();
        let mut timeframes = Timeframes::new();
        timeframes.insert("4h".to_string(), htf);
        let r = run_backtest_with_timeframes(&sees_only_closed_htf, &candles, &timeframes, &config());
        assert_eq!(r.total_trades, 0);
    }
}
