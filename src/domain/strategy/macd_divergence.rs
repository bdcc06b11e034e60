//! MACD histogram divergence.
//!
//! Bullish divergence: of the last two pivot lows inside the divergence window,
//! the later one is a lower price low while the histogram at that pivot is higher.
//! It becomes an entry when the MACD line crosses above its signal line on the
//! latest bar (histogram turns positive). Bearish mirrors this with pivot highs.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::macd_series;
use crate::domain::strategy::patterns::{pivot_highs, pivot_lows, Direction};
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Strategy, StrategyDetails, StrategyParams, StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MacdDivergenceOptions {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub pivot_strength: usize,
    /// Number of trailing candles searched for pivots.
    pub divergence_window: usize,
    /// Stop distance beyond the divergence pivot, percent.
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Exit once |histogram| falls below this after being above it.
    pub exit_threshold: f64,
    pub min_lookback: usize,
}

impl Default for MacdDivergenceOptions {
    fn default() -> Self {
        MacdDivergenceOptions {
            fast: 12,
            slow: 26,
            signal: 9,
            pivot_strength: 3,
            divergence_window: 30,
            stop_loss_pct: 3.0,
            take_profit_pct: 6.0,
            exit_threshold: 0.01,
            min_lookback: 50,
        }
    }
}

impl MacdDivergenceOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = MacdDivergenceOptions::default();
        MacdDivergenceOptions {
            fast: params.count("fast", d.fast),
            slow: params.count("slow", d.slow),
            signal: params.count("signal", d.signal),
            pivot_strength: params.count("pivot_strength", d.pivot_strength),
            divergence_window: params.count("divergence_window", d.divergence_window),
            stop_loss_pct: params.number("stop_loss_pct", d.stop_loss_pct),
            take_profit_pct: params.number("take_profit_pct", d.take_profit_pct),
            exit_threshold: params.number("exit_threshold", d.exit_threshold),
            min_lookback: params.count("min_lookback", d.min_lookback),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("fast", self.fast)
            .with("slow", self.slow)
            .with("signal", self.signal)
            .with("pivot_strength", self.pivot_strength)
            .with("divergence_window", self.divergence_window)
            .with("stop_loss_pct", self.stop_loss_pct)
            .with("take_profit_pct", self.take_profit_pct)
            .with("exit_threshold", self.exit_threshold)
            .with("min_lookback", self.min_lookback)
    }

    pub fn required_candles(&self) -> usize {
        self.min_lookback.max(self.slow + self.signal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdDivergenceDetails {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub divergence: Option<Direction>,
    pub pivot_price: Option<f64>,
}

/// A price/histogram divergence between two pivots. `pivot` indexes the later one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Divergence {
    pub direction: Direction,
    pub pivot: usize,
    pub price: f64,
}

/// Latest divergence among the last two pivots of `candles`, judged on `histogram`
/// (aligned with `candles`). A bullish reading wins when both are present.
pub fn find_divergence(candles: &[Candle], histogram: &[f64], strength: usize) -> Option<Divergence> {
    let lows = pivot_lows(candles, strength);
    if let [.., a, b] = lows[..] {
        let (ha, hb) = (histogram[a], histogram[b]);
        if !ha.is_nan() && !hb.is_nan() && candles[b].low < candles[a].low && hb > ha {
            return Some(Divergence {
                direction: Direction::Bullish,
                pivot: b,
                price: candles[b].low,
            });
        }
    }

    let highs = pivot_highs(candles, strength);
    if let [.., a, b] = highs[..] {
        let (ha, hb) = (histogram[a], histogram[b]);
        if !ha.is_nan() && !hb.is_nan() && candles[b].high > candles[a].high && hb < ha {
            return Some(Divergence {
                direction: Direction::Bearish,
                pivot: b,
                price: candles[b].high,
            });
        }
    }
    None
}

#[derive(Debug, Clone, Default)]
pub struct MacdDivergenceStrategy {
    options: MacdDivergenceOptions,
}

impl MacdDivergenceStrategy {
    pub fn new(options: MacdDivergenceOptions) -> Self {
        MacdDivergenceStrategy { options }
    }
}

impl Strategy for MacdDivergenceStrategy {
    fn name(&self) -> &str {
        "macd_divergence"
    }

    fn evaluate(&self, window: &[Candle], _context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let n = window.len();
        if n < o.required_candles().max(2) {
            return StrategyResponse::insufficient_data();
        }

        let series = macd_series(window, o.fast, o.slow, o.signal);
        let (cur, prev) = (series[n - 1], series[n - 2]);
        if cur.histogram.is_nan() || prev.histogram.is_nan() {
            return StrategyResponse::idle("MACD unavailable");
        }

        let start = n.saturating_sub(o.divergence_window);
        let histogram: Vec<f64> = series[start..].iter().map(|v| v.histogram).collect();
        let divergence = find_divergence(&window[start..], &histogram, o.pivot_strength);

        let details = StrategyDetails::MacdDivergence(MacdDivergenceDetails {
            macd: cur.line,
            signal: cur.signal,
            histogram: cur.histogram,
            divergence: divergence.map(|d| d.direction),
            pivot_price: divergence.map(|d| d.price),
        });

        let close = window[n - 1].close;
        let crossed_up = prev.histogram <= 0.0 && cur.histogram > 0.0;
        let crossed_down = prev.histogram >= 0.0 && cur.histogram < 0.0;
        let faded = cur.histogram.abs() < o.exit_threshold && prev.histogram.abs() >= o.exit_threshold;

        let response = match divergence {
            Some(d) if d.direction == Direction::Bullish && crossed_up => {
                let stop = d.price * (1.0 - o.stop_loss_pct / 100.0);
                let target = close * (1.0 + o.take_profit_pct / 100.0);
                StrategyResponse::entry(
                    Side::Long,
                    PriceLevels::new(close, stop, target),
                    "Bullish divergence confirmed by MACD cross",
                )
            }
            Some(d) if d.direction == Direction::Bearish && crossed_down => {
                let stop = d.price * (1.0 + o.stop_loss_pct / 100.0);
                let target = close * (1.0 - o.take_profit_pct / 100.0);
                StrategyResponse::entry(
                    Side::Short,
                    PriceLevels::new(close, stop, target),
                    "Bearish divergence confirmed by MACD cross",
                )
            }
            _ if faded => StrategyResponse::exit(None, "MACD histogram faded"),
            Some(d) => StrategyResponse::watch(match d.direction {
                Direction::Bullish => "Bullish divergence awaiting confirmation",
                Direction::Bearish => "Bearish divergence awaiting confirmation",
            }),
            None => StrategyResponse::idle("No divergence"),
        };
        response.with_details(details)
    }
}
