//! Technical indicator implementations.
//!
//! Every indicator comes in two shapes:
//! - a `*_series` function returning one value per candle, `f64::NAN` during warm-up
//! - a latest-value function returning an [`IndicatorResult`] for the final candle
//!
//! Short or empty input never panics; it yields `NAN` (or a zeroed value for ADX)
//! with a [`IndicatorSignal::Neutral`] signal.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod mfi;
pub mod rsi;

pub use adx::{adx, adx_series, AdxValue};
pub use atr::{atr, atr_series};
pub use bollinger::{bollinger, bollinger_series, BollingerValue};
pub use ema::{ema, ema_series, ema_values};
pub use macd::{macd, macd_series, MacdValue};
pub use mfi::{mfi, mfi_series};
pub use rsi::{rsi, rsi_series};

use serde::Serialize;
use std::fmt;

/// Oversold threshold shared by the RSI and MFI oscillators.
pub const OSCILLATOR_OVERSOLD: f64 = 30.0;
/// Overbought threshold shared by the RSI and MFI oscillators.
pub const OSCILLATOR_OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorSignal {
    Buy,
    Sell,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorResult<T> {
    pub value: T,
    pub signal: IndicatorSignal,
}

impl<T> IndicatorResult<T> {
    pub fn new(value: T, signal: IndicatorSignal) -> Self {
        Self { value, signal }
    }

    pub fn neutral(value: T) -> Self {
        Self {
            value,
            signal: IndicatorSignal::Neutral,
        }
    }
}

impl fmt::Display for IndicatorSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorSignal::Buy => write!(f, "buy"),
            IndicatorSignal::Sell => write!(f, "sell"),
            IndicatorSignal::Neutral => write!(f, "neutral"),
        }
    }
}

/// Map a 0-100 oscillator reading onto buy/sell/neutral.
pub(crate) fn oscillator_signal(value: f64) -> IndicatorSignal {
    if value.is_nan() {
        IndicatorSignal::Neutral
    } else if value < OSCILLATOR_OVERSOLD {
        IndicatorSignal::Buy
    } else if value > OSCILLATOR_OVERBOUGHT {
        IndicatorSignal::Sell
    } else {
        IndicatorSignal::Neutral
    }
}

/// Ratio oscillator from smoothed up/down averages.
///
/// down == 0 → 100, both zero (flat input) → 50.
pub(crate) fn ratio_oscillator(up: f64, down: f64) -> f64 {
    if down == 0.0 {
        if up == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + up / down))
    }
}

/// Last element of a series, or `NAN` when empty.
pub(crate) fn last_or_nan(series: &[f64]) -> f64 {
    series.last().copied().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillator_thresholds() {
        assert_eq!(oscillator_signal(20.0), IndicatorSignal::Buy);
        assert_eq!(oscillator_signal(80.0), IndicatorSignal::Sell);
        assert_eq!(oscillator_signal(50.0), IndicatorSignal::Neutral);
        assert_eq!(oscillator_signal(30.0), IndicatorSignal::Neutral);
        assert_eq!(oscillator_signal(f64::NAN), IndicatorSignal::Neutral);
    }

    #[test]
    fn ratio_oscillator_degenerate_cases() {
        assert_eq!(ratio_oscillator(1.0, 0.0), 100.0);
        assert_eq!(ratio_oscillator(0.0, 0.0), 50.0);
        assert_eq!(ratio_oscillator(0.0, 1.0), 0.0);
        assert!((ratio_oscillator(1.0, 1.0) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn signal_display() {
        assert_eq!(IndicatorSignal::Buy.to_string(), "buy");
        assert_eq!(IndicatorSignal::Neutral.to_string(), "neutral");
    }
}
