//! Money Flow Index.
//!
//! Raw money flow = typical price * volume. A bar's flow is positive when its
//! typical price rises over the previous bar, negative when it falls, and is
//! ignored when unchanged. Positive and negative flow are Wilder-smoothed the
//! same way RSI smooths gains and losses; MFI = 100 - 100 / (1 + pos / neg).
//!
//! Warmup: first n candles are NaN.

use crate::domain::candle::Candle;
use crate::domain::indicator::{
    last_or_nan, oscillator_signal, ratio_oscillator, IndicatorResult,
};

pub fn mfi_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; candles.len()];
    if period == 0 || candles.len() <= period {
        return values;
    }

    let mut positive = Vec::with_capacity(candles.len() - 1);
    let mut negative = Vec::with_capacity(candles.len() - 1);
    for w in candles.windows(2) {
        let prev_tp = w[0].typical_price();
        let tp = w[1].typical_price();
        let flow = tp * w[1].volume;
        positive.push(if tp > prev_tp { flow } else { 0.0 });
        negative.push(if tp < prev_tp { flow } else { 0.0 });
    }

    let p = period as f64;
    let mut avg_pos = positive[..period].iter().sum::<f64>() / p;
    let mut avg_neg = negative[..period].iter().sum::<f64>() / p;
    values[period] = ratio_oscillator(avg_pos, avg_neg);

    for i in (period + 1)..candles.len() {
        avg_pos = (avg_pos * (p - 1.0) + positive[i - 1]) / p;
        avg_neg = (avg_neg * (p - 1.0) + negative[i - 1]) / p;
        values[i] = ratio_oscillator(avg_pos, avg_neg);
    }

    values
}

pub fn mfi(candles: &[Candle], period: usize) -> IndicatorResult<f64> {
    let value = last_or_nan(&mfi_series(candles, period));
    IndicatorResult::new(value, oscillator_signal(value))
}
