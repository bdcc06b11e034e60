//! Support/resistance breakout.
//!
//! Pivot highs and lows formed before the confirmation bars are clustered into
//! price levels (neighbouring pivots within `tolerance_pct` merge). A level with at
//! least `min_touches` pivots that is closed beyond for `breakout_confirmation`
//! consecutive bars is a breakout. Price dropping back through a level it had
//! just closed beyond is a failed breakout and exits the trade on that side.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::strategy::patterns::{pivot_highs, pivot_lows};
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Strategy, StrategyDetails, StrategyParams, StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SupportResistanceOptions {
    pub pivot_strength: usize,
    pub lookback: usize,
    /// Maximum distance (percent) between pivots of one level.
    pub tolerance_pct: f64,
    pub min_touches: usize,
    pub breakout_confirmation: usize,
    pub stop_loss_pct: f64,
    /// Target used when no further level lies beyond the breakout.
    pub fallback_target_pct: f64,
    pub min_lookback: usize,
}

impl Default for SupportResistanceOptions {
    fn default() -> Self {
        SupportResistanceOptions {
            pivot_strength: 3,
            lookback: 100,
            tolerance_pct: 0.5,
            min_touches: 2,
            breakout_confirmation: 2,
            stop_loss_pct: 2.0,
            fallback_target_pct: 6.0,
            min_lookback: 50,
        }
    }
}

impl SupportResistanceOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = SupportResistanceOptions::default();
        SupportResistanceOptions {
            pivot_strength: params.count("pivot_strength", d.pivot_strength),
            lookback: params.count("lookback", d.lookback),
            tolerance_pct: params.number("tolerance_pct", d.tolerance_pct),
            min_touches: params.count("min_touches", d.min_touches),
            breakout_confirmation: params.count("breakout_confirmation", d.breakout_confirmation),
            stop_loss_pct: params.number("stop_loss_pct", d.stop_loss_pct),
            fallback_target_pct: params.number("fallback_target_pct", d.fallback_target_pct),
            min_lookback: params.count("min_lookback", d.min_lookback),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("pivot_strength", self.pivot_strength)
            .with("lookback", self.lookback)
            .with("tolerance_pct", self.tolerance_pct)
            .with("min_touches", self.min_touches)
            .with("breakout_confirmation", self.breakout_confirmation)
            .with("stop_loss_pct", self.stop_loss_pct)
            .with("fallback_target_pct", self.fallback_target_pct)
            .with("min_lookback", self.min_lookback)
    }

    pub fn required_candles(&self) -> usize {
        let confirmation = self.breakout_confirmation.max(1);
        self.min_lookback
            .max(2 * self.pivot_strength + 2 + confirmation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Level {
    pub price: f64,
    pub touches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportResistanceDetails {
    pub levels: Vec<Level>,
    pub nearest_level: Option<f64>,
    pub broken_level: Option<f64>,
}

/// Merge sorted-ascending prices into levels. A price joins the current cluster
/// while it is within `tolerance_pct` of the cluster mean.
pub fn cluster_levels(prices: &[f64], tolerance_pct: f64, min_touches: usize) -> Vec<Level> {
    let mut sorted: Vec<f64> = prices.iter().copied().filter(|p| p.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut levels = Vec::new();
    let mut sum = 0.0;
    let mut count = 0usize;
    for p in sorted {
        if count > 0 {
            let mean = sum / count as f64;
            if p > mean * (1.0 + tolerance_pct / 100.0) {
                levels.push(Level { price: mean, touches: count });
                sum = 0.0;
                count = 0;
            }
        }
        sum += p;
        count += 1;
    }
    if count > 0 {
        levels.push(Level {
            price: sum / count as f64,
            touches: count,
        });
    }
    levels.retain(|l| l.touches >= min_touches.max(1));
    levels
}

#[derive(Debug, Clone, Default)]
pub struct SupportResistanceStrategy {
    options: SupportResistanceOptions,
}

impl SupportResistanceStrategy {
    pub fn new(options: SupportResistanceOptions) -> Self {
        SupportResistanceStrategy { options }
    }
}

impl Strategy for SupportResistanceStrategy {
    fn name(&self) -> &str {
        "support_resistance"
    }

    fn evaluate(&self, window: &[Candle], _context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let n = window.len();
        if n < o.required_candles() {
            return StrategyResponse::insufficient_data();
        }

        let confirmation = o.breakout_confirmation.max(1);
        let scope_end = n - confirmation;
        let scope = &window[n.saturating_sub(o.lookback).min(scope_end)..scope_end];
        let mut prices: Vec<f64> = pivot_highs(scope, o.pivot_strength)
            .into_iter()
            .map(|i| scope[i].high)
            .collect();
        prices.extend(pivot_lows(scope, o.pivot_strength).into_iter().map(|i| scope[i].low));
        let levels = cluster_levels(&prices, o.tolerance_pct, o.min_touches);

        let close = window[n - 1].close;
        let prev_close = window[n - 2].close;
        let before_break = window[n - 1 - confirmation].close;
        let confirming = &window[n - confirmation..];

        let broken_up = levels
            .iter()
            .filter(|l| before_break <= l.price && confirming.iter().all(|c| c.close > l.price))
            .map(|l| l.price)
            .fold(None, |best: Option<f64>, p| Some(best.map_or(p, |b| b.max(p))));
        let broken_down = levels
            .iter()
            .filter(|l| before_break >= l.price && confirming.iter().all(|c| c.close < l.price))
            .map(|l| l.price)
            .fold(None, |best: Option<f64>, p| Some(best.map_or(p, |b| b.min(p))));

        let failed_up = levels.iter().find(|l| prev_close > l.price && close < l.price);
        let failed_down = levels.iter().find(|l| prev_close < l.price && close > l.price);

        let nearest_level = levels
            .iter()
            .map(|l| l.price)
            .min_by(|a, b| (a - close).abs().total_cmp(&(b - close).abs()));
        let stop = o.stop_loss_pct / 100.0;
        let fallback = o.fallback_target_pct / 100.0;

        let (response, broken_level) = if let Some(level) = broken_up {
            let target = levels
                .iter()
                .map(|l| l.price)
                .filter(|p| *p > close)
                .fold(f64::NAN, f64::min);
            let target = if target.is_nan() { close * (1.0 + fallback) } else { target };
            (
                StrategyResponse::entry(
                    Side::Long,
                    PriceLevels::new(close, level * (1.0 - stop), target),
                    format!("Resistance {level:.2} broken"),
                ),
                Some(level),
            )
        } else if let Some(level) = broken_down {
            let target = levels
                .iter()
                .map(|l| l.price)
                .filter(|p| *p < close)
                .fold(f64::NAN, f64::max);
            let target = if target.is_nan() { close * (1.0 - fallback) } else { target };
            (
                StrategyResponse::entry(
                    Side::Short,
                    PriceLevels::new(close, level * (1.0 + stop), target),
                    format!("Support {level:.2} broken"),
                ),
                Some(level),
            )
        } else if let Some(level) = failed_up {
            (
                StrategyResponse::exit(
                    Some(Side::Long),
                    format!("Failed breakout back below {:.2}", level.price),
                ),
                None,
            )
        } else if let Some(level) = failed_down {
            (
                StrategyResponse::exit(
                    Some(Side::Short),
                    format!("Failed breakdown back above {:.2}", level.price),
                ),
                None,
            )
        } else {
            let near = nearest_level
                .filter(|p| (close - p).abs() / p * 100.0 <= o.tolerance_pct);
            match near {
                Some(p) => (StrategyResponse::watch(format!("Testing level {p:.2}")), None),
                None => (StrategyResponse::idle("Between levels"), None),
            }
        };

        response.with_details(StrategyDetails::SupportResistance(SupportResistanceDetails {
            levels,
            nearest_level,
            broken_level,
        }))
    }
}
