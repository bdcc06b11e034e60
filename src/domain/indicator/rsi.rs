//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n price changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 (50 when avg_gain is also 0)
//!
//! Warmup: first n candles are NaN (need n price changes to seed the averages).

use crate::domain::candle::Candle;
use crate::domain::indicator::{
    last_or_nan, oscillator_signal, ratio_oscillator, IndicatorResult,
};

pub fn rsi_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; candles.len()];
    if period == 0 || candles.len() <= period {
        return values;
    }

    let mut gains: Vec<f64> = Vec::with_capacity(candles.len() - 1);
    let mut losses: Vec<f64> = Vec::with_capacity(candles.len() - 1);
    for w in candles.windows(2) {
        let change = w[1].close - w[0].close;
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    values[period] = ratio_oscillator(avg_gain, avg_loss);

    for i in (period + 1)..candles.len() {
        let change_idx = i - 1;
        avg_gain = (avg_gain * (period - 1) as f64 + gains[change_idx]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[change_idx]) / period as f64;
        values[i] = ratio_oscillator(avg_gain, avg_loss);
    }

    values
}

pub fn rsi(candles: &[Candle], period: usize) -> IndicatorResult<f64> {
    let value = last_or_nan(&rsi_series(candles, period));
    IndicatorResult::new(value, oscillator_signal(value))
}
