//! Open position and closed trade records for the single-position simulator.

use serde::Serialize;
use std::fmt;

use crate::domain::strategy::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: i64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    /// Profit of a fixed `notional` stake if closed at `price`.
    pub fn pnl_at(&self, price: f64, notional: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        self.side.sign() * (price - self.entry_price) * notional / self.entry_price
    }

    /// Whether a bar with range `[low, high]` reaches the stop.
    pub fn should_stop_loss(&self, low: f64, high: f64) -> bool {
        if self.is_long() {
            low <= self.stop_loss
        } else {
            high >= self.stop_loss
        }
    }

    /// Whether a bar with range `[low, high]` reaches the target.
    pub fn should_take_profit(&self, low: f64, high: f64) -> bool {
        if self.is_long() {
            high >= self.take_profit
        } else {
            low <= self.take_profit
        }
    }

    pub fn close(self, exit_time: i64, exit_price: f64, notional: f64, reason: ExitReason) -> TradeRecord {
        let pnl = self.pnl_at(exit_price, notional);
        let pnl_percent = if notional > 0.0 { pnl / notional * 100.0 } else { 0.0 };
        TradeRecord {
            entry_time: self.entry_time,
            exit_time,
            entry_price: self.entry_price,
            exit_price,
            pnl,
            pnl_percent,
            side: self.side,
            exit_reason: reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::Signal => "signal",
            ExitReason::EndOfData => "end_of_data",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub entry_time: i64,
    pub exit_time: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub side: Side,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    /// Holding time in milliseconds.
    pub fn duration(&self) -> i64 {
        self.exit_time - self.entry_time
    }
}
