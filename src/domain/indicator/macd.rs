//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: the line is valid from index slow-1, the signal line and histogram
//! from index slow-1 + signal-1.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::{ema_series, ema_values, IndicatorResult, IndicatorSignal};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdValue {
    fn nan() -> Self {
        MacdValue {
            line: f64::NAN,
            signal: f64::NAN,
            histogram: f64::NAN,
        }
    }
}

pub fn macd_series(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<MacdValue> {
    if fast == 0 || slow == 0 || signal_period == 0 {
        return vec![MacdValue::nan(); candles.len()];
    }

    let ema_fast = ema_series(candles, fast);
    let ema_slow = ema_series(candles, slow);

    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema_values(&line, signal_period);

    line.iter()
        .zip(&signal)
        .map(|(&l, &s)| MacdValue {
            line: l,
            signal: s,
            histogram: l - s,
        })
        .collect()
}

pub fn macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorResult<MacdValue> {
    if candles.len() < slow {
        return IndicatorResult::neutral(MacdValue::nan());
    }
    let value = macd_series(candles, fast, slow, signal_period)
        .last()
        .copied()
        .unwrap_or_else(MacdValue::nan);

    let signal = if value.histogram > 0.0 {
        IndicatorSignal::Buy
    } else if value.histogram < 0.0 {
        IndicatorSignal::Sell
    } else {
        IndicatorSignal::Neutral
    };
    IndicatorResult::new(value, signal)
}

pub fn macd_default(candles: &[Candle]) -> IndicatorResult<MacdValue> {
    macd(candles, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
