//! Price-action structures shared by several strategies: fair value gaps, order
//! blocks, pivots, swing extremes and session killzones.
//!
//! All detection is recomputed from the window on every call; nothing is cached.

use chrono::{DateTime, Timelike};
use chrono_tz::America::New_York;
use serde::Serialize;

use crate::domain::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Bullish,
    Bearish,
}

/// A three-candle imbalance. `index` is the position of the third candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FairValueGap {
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
    pub index: usize,
    pub time: i64,
    pub mitigated: bool,
}

impl FairValueGap {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.bottom && price <= self.top
    }

    /// Distance from `price` to the nearest edge as a percentage of price, 0 inside.
    pub fn distance_pct(&self, price: f64) -> f64 {
        if price <= 0.0 || self.contains(price) {
            return 0.0;
        }
        let edge = if price > self.top { self.top } else { self.bottom };
        (price - edge).abs() / price * 100.0
    }
}

/// Fair value gaps whose third candle lies in the last `lookback` candles.
///
/// Mitigation is judged against every candle after the gap, up to and including
/// the last candle of the slice.
pub fn fair_value_gaps(candles: &[Candle], lookback: usize) -> Vec<FairValueGap> {
    let n = candles.len();
    if n < 3 {
        return Vec::new();
    }
    let first_third = n.saturating_sub(lookback).max(2);

    let mut gaps = Vec::new();
    for i in first_third..n {
        let (c1, c3) = (&candles[i - 2], &candles[i]);
        let gap = if c1.high < c3.low {
            Some((Direction::Bullish, c3.low, c1.high))
        } else if c1.low > c3.high {
            Some((Direction::Bearish, c1.low, c3.high))
        } else {
            None
        };

        if let Some((direction, top, bottom)) = gap {
            let later = &candles[i + 1..];
            let mitigated = match direction {
                Direction::Bullish => later.iter().any(|c| c.low < bottom),
                Direction::Bearish => later.iter().any(|c| c.high > top),
            };
            gaps.push(FairValueGap {
                direction,
                top,
                bottom,
                index: i,
                time: c3.time,
                mitigated,
            });
        }
    }
    gaps
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderBlock {
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
    pub index: usize,
    pub time: i64,
    pub mitigated: bool,
}

impl OrderBlock {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.bottom && price <= self.top
    }
}

/// Order blocks formed in the last `lookback` candles.
///
/// A bullish block is a bearish candle immediately followed by a bullish
/// displacement candle whose body is at least `displacement_multiplier` times the
/// average body of the lookback and which closes above the block's high. Bearish
/// blocks mirror this. A block is mitigated once a later candle closes through it.
pub fn order_blocks(
    candles: &[Candle],
    lookback: usize,
    displacement_multiplier: f64,
) -> Vec<OrderBlock> {
    let n = candles.len();
    if n < 2 {
        return Vec::new();
    }
    let start = n.saturating_sub(lookback);
    let scope = &candles[start..];
    let avg_body = scope.iter().map(Candle::body).sum::<f64>() / scope.len() as f64;
    let min_body = displacement_multiplier * avg_body;

    let mut blocks = Vec::new();
    for i in start..n - 1 {
        let (block, disp) = (&candles[i], &candles[i + 1]);
        if disp.body() <= 0.0 || disp.body() < min_body {
            continue;
        }
        let direction = if block.is_bearish() && disp.is_bullish() && disp.close > block.high {
            Direction::Bullish
        } else if block.is_bullish() && disp.is_bearish() && disp.close < block.low {
            Direction::Bearish
        } else {
            continue;
        };

        let later = &candles[i + 2..];
        let mitigated = match direction {
            Direction::Bullish => later.iter().any(|c| c.close < block.low),
            Direction::Bearish => later.iter().any(|c| c.close > block.high),
        };
        blocks.push(OrderBlock {
            direction,
            top: block.high,
            bottom: block.low,
            index: i,
            time: block.time,
            mitigated,
        });
    }
    blocks
}

/// Indices whose high is strictly above every high within `strength` bars on each side.
pub fn pivot_highs(candles: &[Candle], strength: usize) -> Vec<usize> {
    pivots(candles, strength, |a, b| a.high > b.high)
}

/// Indices whose low is strictly below every low within `strength` bars on each side.
pub fn pivot_lows(candles: &[Candle], strength: usize) -> Vec<usize> {
    pivots(candles, strength, |a, b| a.low < b.low)
}

fn pivots(candles: &[Candle], strength: usize, beats: impl Fn(&Candle, &Candle) -> bool) -> Vec<usize> {
    let n = candles.len();
    if strength == 0 || n < 2 * strength + 1 {
        return Vec::new();
    }
    (strength..n - strength)
        .filter(|&i| {
            (i - strength..=i + strength)
                .filter(|&j| j != i)
                .all(|j| beats(&candles[i], &candles[j]))
        })
        .collect()
}

/// Highest high of the slice, `NAN` when empty.
pub fn swing_high(candles: &[Candle]) -> f64 {
    candles.iter().map(|c| c.high).fold(f64::NAN, f64::max)
}

/// Lowest low of the slice, `NAN` when empty.
pub fn swing_low(candles: &[Candle]) -> f64 {
    candles.iter().map(|c| c.low).fold(f64::NAN, f64::min)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Killzone {
    London,
    NewYork,
}

/// Session killzone for an epoch-millisecond timestamp, judged in New York time.
///
/// London: 02:00-05:00, New York: 09:30-11:00 (start inclusive, end exclusive).
pub fn killzone_at(time_ms: i64) -> Option<Killzone> {
    let utc = DateTime::from_timestamp_millis(time_ms)?;
    let local = utc.with_timezone(&New_York);
    let minute_of_day = local.hour() * 60 + local.minute();
    match minute_of_day {
        120..300 => Some(Killzone::London),
        570..660 => Some(Killzone::NewYork),
        _ => None,
    }
}
