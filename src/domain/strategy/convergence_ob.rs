//! Oscillator convergence inside an order block.
//!
//! Long when RSI and MFI are both below `oversold` and the close sits inside an
//! active (unmitigated) bullish order block; short mirrors this above
//! `overbought` inside a bearish block. Oscillator extremes with no block
//! underneath are only watched.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::{mfi, rsi};
use crate::domain::strategy::patterns::{order_blocks, Direction, OrderBlock};
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Strategy, StrategyDetails, StrategyParams, StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceObOptions {
    pub rsi_period: usize,
    pub mfi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub ob_lookback: usize,
    /// Displacement body size relative to the average body of the lookback.
    pub displacement_multiplier: f64,
    /// Stop distance beyond the block edge, percent.
    pub stop_buffer_pct: f64,
    pub risk_reward: f64,
}

impl Default for ConvergenceObOptions {
    fn default() -> Self {
        ConvergenceObOptions {
            rsi_period: 14,
            mfi_period: 14,
            oversold: 20.0,
            overbought: 80.0,
            ob_lookback: 50,
            displacement_multiplier: 1.5,
            stop_buffer_pct: 0.5,
            risk_reward: 2.0,
        }
    }
}

impl ConvergenceObOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = ConvergenceObOptions::default();
        ConvergenceObOptions {
            rsi_period: params.count("rsi_period", d.rsi_period),
            mfi_period: params.count("mfi_period", d.mfi_period),
            oversold: params.number("oversold", d.oversold),
            overbought: params.number("overbought", d.overbought),
            ob_lookback: params.count("ob_lookback", d.ob_lookback),
            displacement_multiplier: params.number("displacement_multiplier", d.displacement_multiplier),
            stop_buffer_pct: params.number("stop_buffer_pct", d.stop_buffer_pct),
            risk_reward: params.number("risk_reward", d.risk_reward),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("rsi_period", self.rsi_period)
            .with("mfi_period", self.mfi_period)
            .with("oversold", self.oversold)
            .with("overbought", self.overbought)
            .with("ob_lookback", self.ob_lookback)
            .with("displacement_multiplier", self.displacement_multiplier)
            .with("stop_buffer_pct", self.stop_buffer_pct)
            .with("risk_reward", self.risk_reward)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceObDetails {
    pub rsi: f64,
    pub mfi: f64,
    pub active_block: Option<OrderBlock>,
}

#[derive(Debug, Clone, Default)]
pub struct ConvergenceObStrategy {
    options: ConvergenceObOptions,
}

impl ConvergenceObStrategy {
    pub fn new(options: ConvergenceObOptions) -> Self {
        ConvergenceObStrategy { options }
    }
}

impl Strategy for ConvergenceObStrategy {
    fn name(&self) -> &str {
        "convergence_ob"
    }

    fn evaluate(&self, window: &[Candle], _context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let n = window.len();
        if n < o.rsi_period.max(o.mfi_period).max(2) + 1 {
            return StrategyResponse::insufficient_data();
        }

        let rsi = rsi(window, o.rsi_period).value;
        let mfi = mfi(window, o.mfi_period).value;
        if rsi.is_nan() || mfi.is_nan() {
            return StrategyResponse::insufficient_data();
        }

        let close = window[n - 1].close;
        let oversold = rsi < o.oversold && mfi < o.oversold;
        let overbought = rsi > o.overbought && mfi > o.overbought;
        let wanted = if oversold {
            Some(Direction::Bullish)
        } else if overbought {
            Some(Direction::Bearish)
        } else {
            None
        };

        let active_block = wanted.and_then(|direction| {
            order_blocks(window, o.ob_lookback, o.displacement_multiplier)
                .into_iter()
                .rev()
                .find(|b| !b.mitigated && b.direction == direction && b.contains(close))
        });

        let buffer = o.stop_buffer_pct / 100.0;
        let response = match (wanted, active_block) {
            (Some(Direction::Bullish), Some(block)) => StrategyResponse::entry(
                Side::Long,
                PriceLevels::from_risk(Side::Long, close, block.bottom * (1.0 - buffer), o.risk_reward),
                format!("RSI {rsi:.1} / MFI {mfi:.1} oversold inside bullish order block"),
            ),
            (Some(Direction::Bearish), Some(block)) => StrategyResponse::entry(
                Side::Short,
                PriceLevels::from_risk(Side::Short, close, block.top * (1.0 + buffer), o.risk_reward),
                format!("RSI {rsi:.1} / MFI {mfi:.1} overbought inside bearish order block"),
            ),
            (Some(_), None) => StrategyResponse::watch("Oscillator extreme without order block"),
            (None, _) => StrategyResponse::idle("No oscillator convergence"),
        };
        response.with_details(StrategyDetails::ConvergenceOb(ConvergenceObDetails {
            rsi,
            mfi,
            active_block,
        }))
    }
}
