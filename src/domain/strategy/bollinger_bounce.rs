//! Bollinger band mean reversion.
//!
//! Long when the close sits within `proximity_pct` of (or below) the lower band
//! while RSI is oversold, targeting the middle band. Short mirrors this at the
//! upper band. Touching a band without an RSI extreme is a watch.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::{bollinger, rsi};
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Strategy, StrategyDetails, StrategyParams, StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBounceOptions {
    pub period: usize,
    pub std_dev: f64,
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// How close to the band (percent of the band price) counts as touching.
    pub proximity_pct: f64,
    /// Stop distance beyond the band, percent.
    pub stop_buffer_pct: f64,
    pub min_lookback: usize,
}

impl Default for BollingerBounceOptions {
    fn default() -> Self {
        BollingerBounceOptions {
            period: 20,
            std_dev: 2.0,
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
            proximity_pct: 0.5,
            stop_buffer_pct: 2.0,
            min_lookback: 50,
        }
    }
}

impl BollingerBounceOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = BollingerBounceOptions::default();
        BollingerBounceOptions {
            period: params.count("period", d.period),
            std_dev: params.number("std_dev", d.std_dev),
            rsi_period: params.count("rsi_period", d.rsi_period),
            oversold: params.number("oversold", d.oversold),
            overbought: params.number("overbought", d.overbought),
            proximity_pct: params.number("proximity_pct", d.proximity_pct),
            stop_buffer_pct: params.number("stop_buffer_pct", d.stop_buffer_pct),
            min_lookback: params.count("min_lookback", d.min_lookback),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("period", self.period)
            .with("std_dev", self.std_dev)
            .with("rsi_period", self.rsi_period)
            .with("oversold", self.oversold)
            .with("overbought", self.overbought)
            .with("proximity_pct", self.proximity_pct)
            .with("stop_buffer_pct", self.stop_buffer_pct)
            .with("min_lookback", self.min_lookback)
    }

    pub fn required_candles(&self) -> usize {
        self.min_lookback.max(self.period).max(self.rsi_period + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerBounceDetails {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub percent_b: Option<f64>,
    pub rsi: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BollingerBounceStrategy {
    options: BollingerBounceOptions,
}

impl BollingerBounceStrategy {
    pub fn new(options: BollingerBounceOptions) -> Self {
        BollingerBounceStrategy { options }
    }
}

impl Strategy for BollingerBounceStrategy {
    fn name(&self) -> &str {
        "bollinger_bounce"
    }

    fn evaluate(&self, window: &[Candle], _context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let Some(last) = window.last() else {
            return StrategyResponse::insufficient_data();
        };
        if window.len() < o.required_candles() {
            return StrategyResponse::insufficient_data();
        }

        let bands = bollinger(window, o.period, o.std_dev).value;
        let rsi = rsi(window, o.rsi_period).value;
        if !bands.is_valid() || rsi.is_nan() {
            return StrategyResponse::idle("Indicators unavailable");
        }
        let details = StrategyDetails::BollingerBounce(BollingerBounceDetails {
            upper: bands.upper,
            middle: bands.middle,
            lower: bands.lower,
            percent_b: bands.percent_b,
            rsi,
        });
        if bands.width() <= 0.0 {
            return StrategyResponse::idle("Bands collapsed").with_details(details);
        }

        let close = last.close;
        let near_lower = close <= bands.lower * (1.0 + o.proximity_pct / 100.0);
        let near_upper = close >= bands.upper * (1.0 - o.proximity_pct / 100.0);
        let buffer = o.stop_buffer_pct / 100.0;

        let response = if near_lower && rsi < o.oversold {
            let stop = bands.lower.min(close) * (1.0 - buffer);
            StrategyResponse::entry(
                Side::Long,
                PriceLevels::new(close, stop, bands.middle),
                format!("Close at lower band with RSI {rsi:.1}"),
            )
        } else if near_upper && rsi > o.overbought {
            let stop = bands.upper.max(close) * (1.0 + buffer);
            StrategyResponse::entry(
                Side::Short,
                PriceLevels::new(close, stop, bands.middle),
                format!("Close at upper band with RSI {rsi:.1}"),
            )
        } else if near_lower {
            StrategyResponse::watch(format!("Near lower band, RSI {rsi:.1} not oversold"))
        } else if near_upper {
            StrategyResponse::watch(format!("Near upper band, RSI {rsi:.1} not overbought"))
        } else {
            StrategyResponse::idle("Price inside bands")
        };
        response.with_details(details)
    }
}
