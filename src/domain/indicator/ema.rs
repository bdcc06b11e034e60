//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are NaN.

use crate::domain::candle::Candle;
use crate::domain::indicator::{last_or_nan, IndicatorResult, IndicatorSignal};

pub fn ema_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    ema_values(&closes, period)
}

/// EMA over an arbitrary value series. Leading NaNs in `values` are skipped,
/// so this can smooth the output of another indicator.
pub fn ema_values(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let start = match values.iter().position(|v| !v.is_nan()) {
        Some(s) => s,
        None => return out,
    };
    if values.len() - start < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed_end = start + period - 1;
    let mut ema = values[start..=seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end] = ema;

    for i in (seed_end + 1)..values.len() {
        ema = values[i] * k + ema * (1.0 - k);
        out[i] = ema;
    }

    out
}

pub fn ema(candles: &[Candle], period: usize) -> IndicatorResult<f64> {
    let value = last_or_nan(&ema_series(candles, period));
    let signal = match candles.last() {
        Some(last) if !value.is_nan() && last.close > value => IndicatorSignal::Buy,
        Some(last) if !value.is_nan() && last.close < value => IndicatorSignal::Sell,
        _ => IndicatorSignal::Neutral,
    };
    IndicatorResult::new(value, signal)
}
