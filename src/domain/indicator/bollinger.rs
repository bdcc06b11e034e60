//! Bollinger Bands.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//! - %B: (close - lower) / (upper - lower), undefined when the bands collapse
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! Warmup: first (period-1) values are NaN.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorResult, IndicatorSignal};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub percent_b: Option<f64>,
}

impl BollingerValue {
    fn nan() -> Self {
        BollingerValue {
            upper: f64::NAN,
            middle: f64::NAN,
            lower: f64::NAN,
            percent_b: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.middle.is_nan()
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

pub fn bollinger_series(candles: &[Candle], period: usize, std_dev: f64) -> Vec<BollingerValue> {
    let mut values = vec![BollingerValue::nan(); candles.len()];
    if period == 0 {
        return values;
    }

    for i in (period - 1)..candles.len() {
        let window = &candles[i + 1 - period..=i];
        let middle = window.iter().map(|c| c.close).sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|c| {
                let diff = c.close - middle;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;

        let sd = variance.sqrt();
        let upper = middle + std_dev * sd;
        let lower = middle - std_dev * sd;
        let width = upper - lower;
        let percent_b = if width > 0.0 {
            Some((candles[i].close - lower) / width)
        } else {
            None
        };

        values[i] = BollingerValue {
            upper,
            middle,
            lower,
            percent_b,
        };
    }

    values
}

pub fn bollinger(candles: &[Candle], period: usize, std_dev: f64) -> IndicatorResult<BollingerValue> {
    let Some(last) = candles.last() else {
        return IndicatorResult::neutral(BollingerValue::nan());
    };
    if period == 0 || candles.len() < period {
        return IndicatorResult::neutral(BollingerValue::nan());
    }

    let value = bollinger_series(&candles[candles.len() - period..], period, std_dev)
        .last()
        .copied()
        .unwrap_or_else(BollingerValue::nan);

    let signal = if last.close < value.lower {
        IndicatorSignal::Buy
    } else if last.close > value.upper {
        IndicatorSignal::Sell
    } else {
        IndicatorSignal::Neutral
    };
    IndicatorResult::new(value, signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candles(prices: &[f64]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                time: i as i64 * 60_000,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn bollinger_warmup() {
        let series = bollinger_series(&make_candles(&[10.0, 20.0, 30.0, 40.0, 50.0]), 3, 2.0);
        assert!(!series[0].is_valid());
        assert!(!series[1].is_valid());
        assert!(series[2].is_valid());
        assert!(series[4].is_valid());
    }

    #[test]
    fn bollinger_constant_values_collapse() {
        let result = bollinger(&make_candles(&[100.0; 5]), 3, 2.0);
        assert!((result.value.middle - 100.0).abs() < f64::EPSILON);
        assert!((result.value.upper - 100.0).abs() < f64::EPSILON);
        assert!((result.value.lower - 100.0).abs() < f64::EPSILON);
        assert_eq!(result.value.percent_b, None);
        assert_eq!(result.signal, IndicatorSignal::Neutral);
    }

    #[test]
    fn bollinger_basic_calculation() {
        let result = bollinger(&make_candles(&[10.0, 20.0, 30.0]), 3, 2.0);
        let middle: f64 = 20.0;
        let variance: f64 = (100.0 + 0.0 + 100.0) / 3.0;
        let sd = variance.sqrt();

        assert!((result.value.middle - middle).abs() < 1e-10);
        assert!((result.value.upper - (middle + 2.0 * sd)).abs() < 1e-10);
        assert!((result.value.lower - (middle - 2.0 * sd)).abs() < 1e-10);
    }

    #[test]
    fn bollinger_percent_b() {
        let result = bollinger(&make_candles(&[10.0, 20.0, 30.0]), 3, 2.0);
        let v = result.value;
        let expected = (30.0 - v.lower) / (v.upper - v.lower);
        let pb = v.percent_b.expect("width is positive");
        assert!((pb - expected).abs() < 1e-12);
    }

    #[test]
    fn bollinger_signal_below_lower() {
        let mut prices = vec![100.0; 19];
        prices.push(80.0);
        let result = bollinger(&make_candles(&prices), 20, 2.0);
        assert_eq!(result.signal, IndicatorSignal::Buy);
    }

    #[test]
    fn bollinger_insufficient_data() {
        let result = bollinger(&make_candles(&[10.0, 20.0]), 20, 2.0);
        assert!(!result.value.is_valid());
        assert_eq!(result.signal, IndicatorSignal::Neutral);
    }

    #[test]
    fn bollinger_symmetry() {
        let v = bollinger(&make_candles(&[10.0, 20.0, 30.0]), 3, 2.0).value;
        assert!(((v.upper - v.middle) - (v.middle - v.lower)).abs() < 1e-10);
    }
}
