//! ADX and directional indicators (Wilder).
//!
//! +DM = high - prevHigh when it exceeds prevLow - low (and is positive), else 0.
//! -DM = prevLow - low when it exceeds high - prevHigh (and is positive), else 0.
//! TR, +DM and -DM are Wilder-smoothed over n bars (seeded with the plain sum),
//! +DI = 100 * sm(+DM) / sm(TR), -DI likewise,
//! DX = 100 * |+DI - -DI| / (+DI + -DI), ADX = Wilder-smoothed DX.
//!
//! The first ADX needs n DX readings, so it is available from index 2n-1.
//! Below 2n candles the latest-value function returns a zeroed reading.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorResult, IndicatorSignal};

/// ADX level above which a trend is considered established.
pub const TREND_THRESHOLD: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdxValue {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

impl AdxValue {
    pub fn zero() -> Self {
        AdxValue {
            adx: 0.0,
            plus_di: 0.0,
            minus_di: 0.0,
        }
    }

    fn nan() -> Self {
        AdxValue {
            adx: f64::NAN,
            plus_di: f64::NAN,
            minus_di: f64::NAN,
        }
    }
}

pub fn adx_series(candles: &[Candle], period: usize) -> Vec<AdxValue> {
    let n = candles.len();
    let mut values = vec![AdxValue::nan(); n];
    if period == 0 || n <= period {
        return values;
    }

    let mut tr = vec![0.0; n];
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let (prev, cur) = (&candles[i - 1], &candles[i]);
        tr[i] = cur.true_range(prev.close);
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let p = period as f64;
    let mut sm_tr: f64 = tr[1..=period].iter().sum();
    let mut sm_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut sm_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx = vec![f64::NAN; n];
    let mut di = vec![(f64::NAN, f64::NAN); n];
    for i in period..n {
        if i > period {
            sm_tr = sm_tr - sm_tr / p + tr[i];
            sm_plus = sm_plus - sm_plus / p + plus_dm[i];
            sm_minus = sm_minus - sm_minus / p + minus_dm[i];
        }
        let (pdi, mdi) = if sm_tr > 0.0 {
            (100.0 * sm_plus / sm_tr, 100.0 * sm_minus / sm_tr)
        } else {
            (0.0, 0.0)
        };
        let di_sum = pdi + mdi;
        dx[i] = if di_sum > 0.0 {
            100.0 * (pdi - mdi).abs() / di_sum
        } else {
            0.0
        };
        di[i] = (pdi, mdi);
    }

    let first_adx = 2 * period - 1;
    if n <= first_adx {
        return values;
    }

    let mut adx = dx[period..=first_adx].iter().sum::<f64>() / p;
    values[first_adx] = AdxValue {
        adx,
        plus_di: di[first_adx].0,
        minus_di: di[first_adx].1,
    };
    for i in (first_adx + 1)..n {
        adx = (adx * (p - 1.0) + dx[i]) / p;
        values[i] = AdxValue {
            adx,
            plus_di: di[i].0,
            minus_di: di[i].1,
        };
    }

    values
}

pub fn adx(candles: &[Candle], period: usize) -> IndicatorResult<AdxValue> {
    if period == 0 || candles.len() < 2 * period {
        return IndicatorResult::neutral(AdxValue::zero());
    }

    let value = adx_series(candles, period)
        .last()
        .copied()
        .unwrap_or_else(AdxValue::zero);

    let signal = if value.adx >= TREND_THRESHOLD && value.plus_di > value.minus_di {
        IndicatorSignal::Buy
    } else if value.adx >= TREND_THRESHOLD && value.minus_di > value.plus_di {
        IndicatorSignal::Sell
    } else {
        IndicatorSignal::Neutral
    };
    IndicatorResult::new(value, signal)
}
