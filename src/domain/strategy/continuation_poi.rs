//! Multi-timeframe continuation into a point of interest.
//!
//! The higher timeframe close relative to its EMA sets the bias. On the working
//! timeframe the strategy waits for price to retrace into an unmitigated fair
//! value gap aligned with that bias. The gap must have formed before the current
//! bar, and mitigation counts the current bar too, so a gap that has been fully
//! crossed is never traded again.
//!
//! When the requested higher timeframe is missing from the context, the working
//! timeframe itself supplies the bias.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::ema;
use crate::domain::strategy::patterns::{fair_value_gaps, Direction, FairValueGap};
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Strategy, StrategyDetails, StrategyParams, StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationPoiOptions {
    /// Context label of the bias timeframe.
    pub higher_timeframe: String,
    pub htf_ema_period: usize,
    pub fvg_lookback: usize,
    /// Distance to the zone (percent of price) that counts as approaching it.
    pub watch_distance_pct: f64,
    /// Stop distance beyond the far edge of the gap, percent.
    pub stop_buffer_pct: f64,
    pub risk_reward: f64,
}

impl Default for ContinuationPoiOptions {
    fn default() -> Self {
        ContinuationPoiOptions {
            higher_timeframe: "4h".to_string(),
            htf_ema_period: 200,
            fvg_lookback: 50,
            watch_distance_pct: 0.5,
            stop_buffer_pct: 0.1,
            risk_reward: 2.0,
        }
    }
}

impl ContinuationPoiOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = ContinuationPoiOptions::default();
        ContinuationPoiOptions {
            higher_timeframe: params.text("higher_timeframe", &d.higher_timeframe),
            htf_ema_period: params.count("htf_ema_period", d.htf_ema_period),
            fvg_lookback: params.count("fvg_lookback", d.fvg_lookback),
            watch_distance_pct: params.number("watch_distance_pct", d.watch_distance_pct),
            stop_buffer_pct: params.number("stop_buffer_pct", d.stop_buffer_pct),
            risk_reward: params.number("risk_reward", d.risk_reward),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("higher_timeframe", self.higher_timeframe.as_str())
            .with("htf_ema_period", self.htf_ema_period)
            .with("fvg_lookback", self.fvg_lookback)
            .with("watch_distance_pct", self.watch_distance_pct)
            .with("stop_buffer_pct", self.stop_buffer_pct)
            .with("risk_reward", self.risk_reward)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinuationPoiDetails {
    /// Timeframe that supplied the bias, `None` when the working timeframe was used.
    pub bias_timeframe: Option<String>,
    pub bias: Option<Direction>,
    pub htf_close: f64,
    pub htf_ema: f64,
    pub fvg: Option<FairValueGap>,
}

#[derive(Debug, Clone, Default)]
pub struct ContinuationPoiStrategy {
    options: ContinuationPoiOptions,
}

impl ContinuationPoiStrategy {
    pub fn new(options: ContinuationPoiOptions) -> Self {
        ContinuationPoiStrategy { options }
    }
}

impl Strategy for ContinuationPoiStrategy {
    fn name(&self) -> &str {
        "continuation_poi"
    }

    fn evaluate(&self, window: &[Candle], context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let n = window.len();
        if n < 3 {
            return StrategyResponse::insufficient_data();
        }

        let (bias_series, bias_timeframe) = match context.get(&o.higher_timeframe) {
            Some(series) => (series, Some(o.higher_timeframe.clone())),
            None => (window, None),
        };
        if o.htf_ema_period == 0 || bias_series.len() < o.htf_ema_period {
            return StrategyResponse::insufficient_data();
        }
        let htf_ema = ema(bias_series, o.htf_ema_period).value;
        let htf_close = bias_series[bias_series.len() - 1].close;
        let bias = if htf_close > htf_ema {
            Some(Direction::Bullish)
        } else if htf_close < htf_ema {
            Some(Direction::Bearish)
        } else {
            None
        };

        let last = &window[n - 1];
        let aligned: Vec<FairValueGap> = match bias {
            Some(direction) => fair_value_gaps(window, o.fvg_lookback)
                .into_iter()
                .filter(|g| g.direction == direction && !g.mitigated && g.index < n - 1)
                .collect(),
            None => Vec::new(),
        };

        let touched = aligned.iter().rev().find(|g| match g.direction {
            Direction::Bullish => last.low <= g.top,
            Direction::Bearish => last.high >= g.bottom,
        });
        let approaching = aligned
            .iter()
            .rev()
            .find(|g| g.distance_pct(last.close) <= o.watch_distance_pct);

        let buffer = o.stop_buffer_pct / 100.0;
        let (response, fvg) = match (touched, approaching) {
            (Some(g), _) if g.direction == Direction::Bullish => (
                StrategyResponse::entry(
                    Side::Long,
                    PriceLevels::from_risk(Side::Long, g.top, g.bottom * (1.0 - buffer), o.risk_reward),
                    "Retrace into bullish FVG with higher timeframe uptrend",
                ),
                Some(*g),
            ),
            (Some(g), _) => (
                StrategyResponse::entry(
                    Side::Short,
                    PriceLevels::from_risk(Side::Short, g.bottom, g.top * (1.0 + buffer), o.risk_reward),
                    "Retrace into bearish FVG with higher timeframe downtrend",
                ),
                Some(*g),
            ),
            (None, Some(g)) => (
                StrategyResponse::watch(format!(
                    "Within {:.2}% of FVG {:.2}-{:.2}",
                    g.distance_pct(last.close),
                    g.bottom,
                    g.top
                )),
                Some(*g),
            ),
            (None, None) if bias.is_none() => (StrategyResponse::idle("No higher timeframe bias"), None),
            (None, None) => (StrategyResponse::idle("No aligned FVG in reach"), None),
        };

        response.with_details(StrategyDetails::ContinuationPoi(ContinuationPoiDetails {
            bias_timeframe,
            bias,
            htf_close,
            htf_ema,
            fvg,
        }))
    }
}
