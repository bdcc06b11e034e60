//! Trend pullback into the Bollinger band ("golden" setup).
//!
//! Long requires an established uptrend (close and EMA50 above EMA200, ADX at
//! least `min_adx`), a previous candle whose low pierced its lower band, a close
//! back above the current lower band, and RSI under `rsi_threshold`. Short is the
//! mirror with the upper band and RSI above `100 - rsi_threshold`. Stops sit
//! `atr_multiplier` ATRs from the entry and targets `risk_reward` times that risk.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::{adx, atr, bollinger, ema, rsi};
use crate::domain::strategy::patterns::Direction;
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Strategy, StrategyDetails, StrategyParams, StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct GoldenOptions {
    pub fast_ema: usize,
    pub slow_ema: usize,
    pub adx_period: usize,
    pub min_adx: f64,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub rsi_period: usize,
    /// Long entries need RSI below this; shorts need RSI above 100 minus it.
    pub rsi_threshold: f64,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub risk_reward: f64,
}

impl Default for GoldenOptions {
    fn default() -> Self {
        GoldenOptions {
            fast_ema: 50,
            slow_ema: 200,
            adx_period: 14,
            min_adx: 20.0,
            bb_period: 20,
            bb_std_dev: 2.0,
            rsi_period: 14,
            rsi_threshold: 40.0,
            atr_period: 14,
            atr_multiplier: 2.0,
            risk_reward: 2.0,
        }
    }
}

impl GoldenOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = GoldenOptions::default();
        GoldenOptions {
            fast_ema: params.count("fast_ema", d.fast_ema),
            slow_ema: params.count("slow_ema", d.slow_ema),
            adx_period: params.count("adx_period", d.adx_period),
            min_adx: params.number("min_adx", d.min_adx),
            bb_period: params.count("bb_period", d.bb_period),
            bb_std_dev: params.number("bb_std_dev", d.bb_std_dev),
            rsi_period: params.count("rsi_period", d.rsi_period),
            rsi_threshold: params.number("rsi_threshold", d.rsi_threshold),
            atr_period: params.count("atr_period", d.atr_period),
            atr_multiplier: params.number("atr_multiplier", d.atr_multiplier),
            risk_reward: params.number("risk_reward", d.risk_reward),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("fast_ema", self.fast_ema)
            .with("slow_ema", self.slow_ema)
            .with("adx_period", self.adx_period)
            .with("min_adx", self.min_adx)
            .with("bb_period", self.bb_period)
            .with("bb_std_dev", self.bb_std_dev)
            .with("rsi_period", self.rsi_period)
            .with("rsi_threshold", self.rsi_threshold)
            .with("atr_period", self.atr_period)
            .with("atr_multiplier", self.atr_multiplier)
            .with("risk_reward", self.risk_reward)
    }

    /// One more than the longest indicator warm-up, so the previous candle has bands too.
    pub fn required_candles(&self) -> usize {
        [
            self.slow_ema,
            self.fast_ema,
            2 * self.adx_period,
            self.bb_period + 1,
            self.rsi_period + 1,
            self.atr_period + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoldenDetails {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub adx: f64,
    pub rsi: f64,
    pub atr: f64,
    pub lower_band: f64,
    pub upper_band: f64,
    pub trend: Option<Direction>,
}

#[derive(Debug, Clone, Default)]
pub struct GoldenStrategy {
    options: GoldenOptions,
}

impl GoldenStrategy {
    pub fn new(options: GoldenOptions) -> Self {
        GoldenStrategy { options }
    }
}

impl Strategy for GoldenStrategy {
    fn name(&self) -> &str {
        "golden"
    }

    fn evaluate(&self, window: &[Candle], _context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let n = window.len();
        if n < o.required_candles() {
            return StrategyResponse::insufficient_data();
        }

        let last = &window[n - 1];
        let prev = &window[n - 2];
        let ema_fast = ema(window, o.fast_ema).value;
        let ema_slow = ema(window, o.slow_ema).value;
        let trend = adx(window, o.adx_period).value;
        let rsi = rsi(window, o.rsi_period).value;
        let atr = atr(window, o.atr_period).value;
        let bands = bollinger(window, o.bb_period, o.bb_std_dev).value;
        let prev_bands = bollinger(&window[..n - 1], o.bb_period, o.bb_std_dev).value;

        let up = last.close > ema_slow && ema_fast > ema_slow;
        let down = last.close < ema_slow && ema_fast < ema_slow;
        let details = StrategyDetails::Golden(GoldenDetails {
            ema_fast,
            ema_slow,
            adx: trend.adx,
            rsi,
            atr,
            lower_band: bands.lower,
            upper_band: bands.upper,
            trend: match (up, down) {
                (true, _) => Some(Direction::Bullish),
                (_, true) => Some(Direction::Bearish),
                _ => None,
            },
        });

        if !(atr > 0.0) || !bands.is_valid() || !prev_bands.is_valid() || rsi.is_nan() {
            return StrategyResponse::idle("Indicators unavailable").with_details(details);
        }
        if trend.adx < o.min_adx {
            return StrategyResponse::idle(format!("ADX {:.1} below {:.1}", trend.adx, o.min_adx))
                .with_details(details);
        }

        let risk = atr * o.atr_multiplier;
        let response = if up
            && prev.low < prev_bands.lower
            && last.close > bands.lower
            && rsi < o.rsi_threshold
        {
            let entry = last.close;
            StrategyResponse::entry(
                Side::Long,
                PriceLevels::from_risk(Side::Long, entry, entry - risk, o.risk_reward),
                format!("Uptrend pullback reclaimed lower band, RSI {rsi:.1}"),
            )
        } else if down
            && prev.high > prev_bands.upper
            && last.close < bands.upper
            && rsi > 100.0 - o.rsi_threshold
        {
            let entry = last.close;
            StrategyResponse::entry(
                Side::Short,
                PriceLevels::from_risk(Side::Short, entry, entry + risk, o.risk_reward),
                format!("Downtrend rally rejected at upper band, RSI {rsi:.1}"),
            )
        } else if up || down {
            StrategyResponse::idle("Trend intact, no pullback setup")
        } else {
            StrategyResponse::idle("No trend alignment")
        };
        response.with_details(details)
    }
}
