//! Golden / death cross on two EMAs.
//!
//! A cross is fresh while it is younger than `confirmation_candles` bars and the
//! fast EMA still sits on the new side: that is the entry window. When the cross
//! reaches exactly `confirmation_candles` bars of age it is confirmed, and any
//! position on the opposite side is asked to exit.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::ema_series;
use crate::domain::strategy::patterns::Direction;
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Strategy, StrategyDetails, StrategyParams, StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct EmaCrossoverOptions {
    pub fast_period: usize,
    pub slow_period: usize,
    pub confirmation_candles: usize,
    /// Stop distance beyond the slow EMA, percent.
    pub stop_buffer_pct: f64,
    pub take_profit_pct: f64,
    /// EMA separation (percent of the slow EMA) under which a narrowing gap is watched.
    pub watch_separation_pct: f64,
}

impl Default for EmaCrossoverOptions {
    fn default() -> Self {
        EmaCrossoverOptions {
            fast_period: 50,
            slow_period: 200,
            confirmation_candles: 3,
            stop_buffer_pct: 2.0,
            take_profit_pct: 8.0,
            watch_separation_pct: 1.0,
        }
    }
}

impl EmaCrossoverOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = EmaCrossoverOptions::default();
        EmaCrossoverOptions {
            fast_period: params.count("fast_period", d.fast_period),
            slow_period: params.count("slow_period", d.slow_period),
            confirmation_candles: params.count("confirmation_candles", d.confirmation_candles),
            stop_buffer_pct: params.number("stop_buffer_pct", d.stop_buffer_pct),
            take_profit_pct: params.number("take_profit_pct", d.take_profit_pct),
            watch_separation_pct: params.number("watch_separation_pct", d.watch_separation_pct),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("fast_period", self.fast_period)
            .with("slow_period", self.slow_period)
            .with("confirmation_candles", self.confirmation_candles)
            .with("stop_buffer_pct", self.stop_buffer_pct)
            .with("take_profit_pct", self.take_profit_pct)
            .with("watch_separation_pct", self.watch_separation_pct)
    }

    pub fn required_candles(&self) -> usize {
        self.slow_period.max(self.fast_period) + self.confirmation_candles + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmaCrossoverDetails {
    pub fast_ema: f64,
    pub slow_ema: f64,
    pub separation_pct: f64,
    pub cross: Option<Direction>,
    /// Bars since the cross, 0 when it happened on the latest candle.
    pub cross_age: Option<usize>,
}

/// -1, 0 or 1 for the side of the fast EMA relative to the slow one.
fn side_of(diff: f64, scale: f64) -> i8 {
    if diff.is_nan() || diff.abs() <= scale.abs() * 1e-9 {
        0
    } else if diff > 0.0 {
        1
    } else {
        -1
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmaCrossoverStrategy {
    options: EmaCrossoverOptions,
}

impl EmaCrossoverStrategy {
    pub fn new(options: EmaCrossoverOptions) -> Self {
        EmaCrossoverStrategy { options }
    }
}

impl Strategy for EmaCrossoverStrategy {
    fn name(&self) -> &str {
        "ema_crossover"
    }

    fn evaluate(&self, window: &[Candle], _context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let n = window.len();
        if n < o.required_candles() || o.fast_period == 0 || o.slow_period == 0 {
            return StrategyResponse::insufficient_data();
        }

        let fast = ema_series(window, o.fast_period);
        let slow = ema_series(window, o.slow_period);
        let sides: Vec<i8> = fast
            .iter()
            .zip(&slow)
            .map(|(f, s)| side_of(f - s, *s))
            .collect();

        let (f, s) = (fast[n - 1], slow[n - 1]);
        let diff = f - s;
        let prev_diff = fast[n - 2] - slow[n - 2];
        let current = sides[n - 1];

        // most recent cross within reach of the confirmation window
        let cross = (0..=o.confirmation_candles).find_map(|age| {
            let i = n - 1 - age;
            let (before, after) = (sides[i - 1], sides[i]);
            match (before, after) {
                (b, 1) if b <= 0 => Some((Direction::Bullish, age)),
                (b, -1) if b >= 0 => Some((Direction::Bearish, age)),
                _ => None,
            }
        });
        // a cross only counts while the fast EMA is still on the new side
        let cross = cross.filter(|(dir, age)| {
            let want = if *dir == Direction::Bullish { 1 } else { -1 };
            sides[n - 1 - age..].iter().all(|&side| side == want)
        });

        let separation_pct = if s != 0.0 { diff.abs() / s * 100.0 } else { 0.0 };
        let details = StrategyDetails::EmaCrossover(EmaCrossoverDetails {
            fast_ema: f,
            slow_ema: s,
            separation_pct,
            cross: cross.map(|(d, _)| d),
            cross_age: cross.map(|(_, a)| a),
        });

        let close = window[n - 1].close;
        let buffer = o.stop_buffer_pct / 100.0;
        let tp = o.take_profit_pct / 100.0;

        let response = match cross {
            Some((Direction::Bullish, age)) if age < o.confirmation_candles => StrategyResponse::entry(
                Side::Long,
                PriceLevels::new(close, s * (1.0 - buffer), close * (1.0 + tp)),
                format!("Golden cross {age} bar(s) ago"),
            ),
            Some((Direction::Bearish, age)) if age < o.confirmation_candles => StrategyResponse::entry(
                Side::Short,
                PriceLevels::new(close, s * (1.0 + buffer), close * (1.0 - tp)),
                format!("Death cross {age} bar(s) ago"),
            ),
            Some((Direction::Bullish, _)) => {
                StrategyResponse::exit(Some(Side::Short), "Golden cross confirmed")
            }
            Some((Direction::Bearish, _)) => {
                StrategyResponse::exit(Some(Side::Long), "Death cross confirmed")
            }
            None if current != 0
                && separation_pct < o.watch_separation_pct
                && diff.abs() < prev_diff.abs() =>
            {
                StrategyResponse::watch(format!("EMAs converging ({separation_pct:.2}% apart)"))
            }
            None => StrategyResponse::idle(match current {
                1 => "Fast EMA above slow EMA",
                -1 => "Fast EMA below slow EMA",
                _ => "EMAs flat",
            }),
        };
        response.with_details(details)
    }
}
