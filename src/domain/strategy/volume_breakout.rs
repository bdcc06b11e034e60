//! Volume-confirmed range breakout.
//!
//! The latest close must clear the trailing `lookback` high (low) by
//! `breakout_threshold_pct` on volume at least `volume_multiplier` times the
//! trailing average. Either half alone is a watch. Once volume falls back below
//! its average within `spike_memory` bars of a spike the move is considered
//! spent and the strategy asks to exit.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::strategy::patterns::{swing_high, swing_low, Direction};
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Strategy, StrategyDetails, StrategyParams, StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeBreakoutOptions {
    pub volume_period: usize,
    pub volume_multiplier: f64,
    pub lookback: usize,
    pub breakout_threshold_pct: f64,
    /// Stop distance back inside the broken level, percent.
    pub stop_loss_pct: f64,
    /// Target distance as a multiple of the trailing range.
    pub range_multiplier: f64,
    pub spike_memory: usize,
}

impl Default for VolumeBreakoutOptions {
    fn default() -> Self {
        VolumeBreakoutOptions {
            volume_period: 20,
            volume_multiplier: 2.0,
            lookback: 20,
            breakout_threshold_pct: 0.5,
            stop_loss_pct: 2.0,
            range_multiplier: 1.5,
            spike_memory: 3,
        }
    }
}

impl VolumeBreakoutOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = VolumeBreakoutOptions::default();
        VolumeBreakoutOptions {
            volume_period: params.count("volume_period", d.volume_period),
            volume_multiplier: params.number("volume_multiplier", d.volume_multiplier),
            lookback: params.count("lookback", d.lookback),
            breakout_threshold_pct: params.number("breakout_threshold_pct", d.breakout_threshold_pct),
            stop_loss_pct: params.number("stop_loss_pct", d.stop_loss_pct),
            range_multiplier: params.number("range_multiplier", d.range_multiplier),
            spike_memory: params.count("spike_memory", d.spike_memory),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("volume_period", self.volume_period)
            .with("volume_multiplier", self.volume_multiplier)
            .with("lookback", self.lookback)
            .with("breakout_threshold_pct", self.breakout_threshold_pct)
            .with("stop_loss_pct", self.stop_loss_pct)
            .with("range_multiplier", self.range_multiplier)
            .with("spike_memory", self.spike_memory)
    }

    pub fn required_candles(&self) -> usize {
        self.volume_period.max(self.lookback).max(1) + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeBreakoutDetails {
    pub volume_ratio: f64,
    pub average_volume: f64,
    pub trailing_high: f64,
    pub trailing_low: f64,
    pub breakout: Option<Direction>,
}

/// Volume of candle `i` over the mean volume of the `period` candles before it.
/// Zero when the average is zero or there is not enough history.
fn volume_ratio(candles: &[Candle], i: usize, period: usize) -> (f64, f64) {
    if period == 0 || i < period {
        return (0.0, 0.0);
    }
    let avg = candles[i - period..i].iter().map(|c| c.volume).sum::<f64>() / period as f64;
    if avg > 0.0 {
        (candles[i].volume / avg, avg)
    } else {
        (0.0, avg)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VolumeBreakoutStrategy {
    options: VolumeBreakoutOptions,
}

impl VolumeBreakoutStrategy {
    pub fn new(options: VolumeBreakoutOptions) -> Self {
        VolumeBreakoutStrategy { options }
    }
}

impl Strategy for VolumeBreakoutStrategy {
    fn name(&self) -> &str {
        "volume_breakout"
    }

    fn evaluate(&self, window: &[Candle], _context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let n = window.len();
        if n < o.required_candles() {
            return StrategyResponse::insufficient_data();
        }

        let last = &window[n - 1];
        let prior = &window[n - 1 - o.lookback.max(1)..n - 1];
        let trailing_high = swing_high(prior);
        let trailing_low = swing_low(prior);
        let range = trailing_high - trailing_low;
        let (ratio, average_volume) = volume_ratio(window, n - 1, o.volume_period);

        let spike = ratio >= o.volume_multiplier;
        let threshold = o.breakout_threshold_pct / 100.0;
        let breakout = if last.close > trailing_high * (1.0 + threshold) {
            Some(Direction::Bullish)
        } else if last.close < trailing_low * (1.0 - threshold) {
            Some(Direction::Bearish)
        } else {
            None
        };

        let recent_spike = (1..=o.spike_memory)
            .filter(|back| *back < n)
            .any(|back| volume_ratio(window, n - 1 - back, o.volume_period).0 >= o.volume_multiplier);

        let details = StrategyDetails::VolumeBreakout(VolumeBreakoutDetails {
            volume_ratio: ratio,
            average_volume,
            trailing_high,
            trailing_low,
            breakout,
        });

        let stop = o.stop_loss_pct / 100.0;
        let response = match breakout {
            Some(Direction::Bullish) if spike => StrategyResponse::entry(
                Side::Long,
                PriceLevels::new(
                    last.close,
                    trailing_high * (1.0 - stop),
                    last.close + o.range_multiplier * range,
                ),
                format!("Breakout above {trailing_high:.2} on {ratio:.1}x volume"),
            ),
            Some(Direction::Bearish) if spike => StrategyResponse::entry(
                Side::Short,
                PriceLevels::new(
                    last.close,
                    trailing_low * (1.0 + stop),
                    last.close - o.range_multiplier * range,
                ),
                format!("Breakdown below {trailing_low:.2} on {ratio:.1}x volume"),
            ),
            _ if ratio < 1.0 && recent_spike => StrategyResponse::exit(None, "Volume faded after spike"),
            Some(_) => StrategyResponse::watch("Price breakout without volume"),
            None if spike => StrategyResponse::watch(format!("Volume spike {ratio:.1}x without breakout")),
            None => StrategyResponse::idle("No breakout"),
        };
        response.with_details(details)
    }
}
