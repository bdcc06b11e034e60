//! Average True Range (Wilder).
//!
//! TR[i] = max(high-low, |high-prevClose|, |low-prevClose|) for i >= 1.
//! The first ATR is the plain mean of TR[1..=n], available at index n; after that
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n.

use crate::domain::candle::Candle;
use crate::domain::indicator::{last_or_nan, IndicatorResult};

pub fn atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; candles.len()];
    if period == 0 || candles.len() <= period {
        return values;
    }

    let tr: Vec<f64> = candles
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect();

    // tr[k] is the true range of candle k+1
    let mut atr = tr[..period].iter().sum::<f64>() / period as f64;
    values[period] = atr;

    for i in (period + 1)..candles.len() {
        atr = (atr * (period - 1) as f64 + tr[i - 1]) / period as f64;
        values[i] = atr;
    }

    values
}

/// Volatility has no directional reading, so the signal is always neutral.
pub fn atr(candles: &[Candle], period: usize) -> IndicatorResult<f64> {
    IndicatorResult::neutral(last_or_nan(&atr_series(candles, period)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candle(i: i64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            time: i * 86_400_000,
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn atr_warmup() {
        let candles: Vec<Candle> = (0..5).map(|i| make_candle(i, 110.0, 90.0, 100.0)).collect();
        let series = atr_series(&candles, 3);
        assert_eq!(series.len(), 5);
        assert!(series[2].is_nan());
        assert!(!series[3].is_nan());
        assert!(!series[4].is_nan());
    }

    #[test]
    fn atr_seed_is_average() {
        let candles = vec![
            make_candle(0, 110.0, 100.0, 105.0),
            make_candle(1, 115.0, 105.0, 110.0),
            make_candle(2, 120.0, 110.0, 115.0),
            make_candle(3, 125.0, 115.0, 120.0),
        ];
        let series = atr_series(&candles, 3);
        assert!((series[3] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let candles = vec![
            make_candle(0, 110.0, 100.0, 105.0),
            make_candle(1, 115.0, 105.0, 110.0),
            make_candle(2, 120.0, 110.0, 115.0),
            make_candle(3, 125.0, 115.0, 120.0),
            make_candle(4, 150.0, 120.0, 140.0),
        ];
        let series = atr_series(&candles, 3);
        // TR of the last candle: max(30, |150-120|, |120-120|) = 30
        let expected = (10.0 * 2.0 + 30.0) / 3.0;
        assert!((series[4] - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_needs_period_plus_one() {
        let candles: Vec<Candle> = (0..3).map(|i| make_candle(i, 110.0, 90.0, 100.0)).collect();
        assert!(atr(&candles, 3).value.is_nan());
        assert!(atr(&candles, 2).value.is_finite());
    }

    #[test]
    fn atr_handles_gaps() {
        let candles = vec![
            make_candle(0, 110.0, 100.0, 105.0),
            make_candle(1, 130.0, 120.0, 125.0),
            make_candle(2, 120.0, 110.0, 115.0),
        ];
        let series = atr_series(&candles, 1);
        // gap up: |130 - 105| = 25 dominates the 10 point range
        assert!((series[1] - 25.0).abs() < 1e-9);
    }
}
