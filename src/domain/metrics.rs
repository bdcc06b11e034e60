//! Performance statistics over a backtest's trade ledger.
//!
//! Equity is sampled once per closed trade (the balance is additive), so
//! drawdown and the per-trade Sharpe ratio are measured in trades, not time.

use serde::Serialize;

use super::backtest::BacktestResult;
use super::position::{ExitReason, TradeRecord};

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    /// Longest run of trades spent below the previous equity peak.
    pub max_drawdown_duration: usize,
    pub trade_sharpe: f64,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Mean holding time in hours.
    pub avg_trade_duration: f64,
    pub exits: ExitCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExitCounts {
    pub stop_loss: usize,
    pub take_profit: usize,
    pub signal: usize,
    pub end_of_data: usize,
}

impl ExitCounts {
    fn record(&mut self, reason: ExitReason) {
        match reason {
            ExitReason::StopLoss => self.stop_loss += 1,
            ExitReason::TakeProfit => self.take_profit += 1,
            ExitReason::Signal => self.signal += 1,
            ExitReason::EndOfData => self.end_of_data += 1,
        }
    }
}

impl Metrics {
    pub fn compute(result: &BacktestResult) -> Self {
        let trades = &result.trades;
        let initial_balance = result.initial_balance;

        let total_return = if initial_balance > 0.0 {
            (result.final_balance - initial_balance) / initial_balance
        } else {
            0.0
        };

        let equity_curve = equity_curve(initial_balance, trades);
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&equity_curve);
        let trade_sharpe = compute_trade_sharpe(trades);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_duration_ms = 0i64;
        let mut exits = ExitCounts::default();

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_duration_ms += trade.duration();
            exits.record(trade.exit_reason);
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let (expectancy, avg_trade_duration) = if total_trades > 0 {
            (
                (total_wins - total_losses) / total_trades as f64,
                total_duration_ms as f64 / MS_PER_HOUR / total_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        Metrics {
            total_return,
            max_drawdown,
            max_drawdown_duration,
            trade_sharpe,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            expectancy,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_trade_duration,
            exits,
        }
    }
}

/// Balance before the first trade and after each closed trade.
pub fn equity_curve(initial_balance: f64, trades: &[TradeRecord]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut balance = initial_balance;
    curve.push(balance);
    for trade in trades {
        balance += trade.pnl;
        curve.push(balance);
    }
    curve
}

fn compute_drawdown(equity_curve: &[f64]) -> (f64, usize) {
    let Some(&first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
            current_dd_duration = 0;
        } else if peak > 0.0 && equity < peak {
            max_dd = max_dd.max((peak - equity) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

/// Mean over standard deviation of per-trade percentage returns, unannualised.
fn compute_trade_sharpe(trades: &[TradeRecord]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }
    let n = trades.len() as f64;
    let mean = trades.iter().map(|t| t.pnl_percent).sum::<f64>() / n;
    let variance = trades
        .iter()
        .map(|t| (t.pnl_percent - mean).powi(2))
        .sum::<f64>()
        / n;
    let stddev = variance.sqrt();
    if stddev > 0.0 { mean / stddev } else { 0.0 }
}
