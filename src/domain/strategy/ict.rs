//! ICT / smart-money liquidity sweep.
//!
//! A bullish sweep is a candle that wicks below the lowest low of the previous
//! `swing_lookback` candles and then closes back up by at least `reclaim_ratio`
//! of the distance it travelled beyond that low. That is an immediate long with
//! the stop at the wick extreme. Without a sweep, the most recent unmitigated fair
//! value gap is reported as a watch. Setups inside the London or New York
//! killzone are flagged high probability.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::strategy::patterns::{
    fair_value_gaps, killzone_at, swing_high, swing_low, Direction, FairValueGap, Killzone,
};
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Status, Strategy, StrategyDetails, StrategyParams,
    StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct IctOptions {
    pub swing_lookback: usize,
    /// Fraction of the wick beyond the swing that the close must win back.
    pub reclaim_ratio: f64,
    pub fvg_lookback: usize,
    pub risk_reward: f64,
}

impl Default for IctOptions {
    fn default() -> Self {
        IctOptions {
            swing_lookback: 20,
            reclaim_ratio: 0.5,
            fvg_lookback: 50,
            risk_reward: 2.0,
        }
    }
}

impl IctOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = IctOptions::default();
        IctOptions {
            swing_lookback: params.count("swing_lookback", d.swing_lookback),
            reclaim_ratio: params.number("reclaim_ratio", d.reclaim_ratio),
            fvg_lookback: params.count("fvg_lookback", d.fvg_lookback),
            risk_reward: params.number("risk_reward", d.risk_reward),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("swing_lookback", self.swing_lookback)
            .with("reclaim_ratio", self.reclaim_ratio)
            .with("fvg_lookback", self.fvg_lookback)
            .with("risk_reward", self.risk_reward)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IctDetails {
    pub sweep: Option<Direction>,
    pub swing_high: f64,
    pub swing_low: f64,
    pub fvg: Option<FairValueGap>,
    pub killzone: Option<Killzone>,
    pub high_probability: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IctStrategy {
    options: IctOptions,
}

impl IctStrategy {
    pub fn new(options: IctOptions) -> Self {
        IctStrategy { options }
    }
}

impl Strategy for IctStrategy {
    fn name(&self) -> &str {
        "ict"
    }

    fn evaluate(&self, window: &[Candle], _context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let n = window.len();
        if o.swing_lookback == 0 || n < o.swing_lookback + 1 {
            return StrategyResponse::insufficient_data();
        }

        let last = &window[n - 1];
        let prior = &window[n - 1 - o.swing_lookback..n - 1];
        let (high, low) = (swing_high(prior), swing_low(prior));

        let sweep = if last.low < low && last.close - last.low >= o.reclaim_ratio * (low - last.low) {
            Some(Direction::Bullish)
        } else if last.high > high && last.high - last.close >= o.reclaim_ratio * (last.high - high) {
            Some(Direction::Bearish)
        } else {
            None
        };

        let fvg = fair_value_gaps(window, o.fvg_lookback)
            .into_iter()
            .rev()
            .find(|g| !g.mitigated);
        let killzone = killzone_at(last.time);

        let response = match sweep {
            Some(Direction::Bullish) => StrategyResponse::entry(
                Side::Long,
                PriceLevels::from_risk(Side::Long, last.close, last.low, o.risk_reward),
                format!("Sell-side liquidity swept below {low:.2}"),
            ),
            Some(Direction::Bearish) => StrategyResponse::entry(
                Side::Short,
                PriceLevels::from_risk(Side::Short, last.close, last.high, o.risk_reward),
                format!("Buy-side liquidity swept above {high:.2}"),
            ),
            None => match fvg {
                Some(g) => StrategyResponse::watch(match g.direction {
                    Direction::Bullish => "Unmitigated bullish FVG",
                    Direction::Bearish => "Unmitigated bearish FVG",
                }),
                None => StrategyResponse::idle("No sweep or open FVG"),
            },
        };

        let high_probability = killzone.is_some() && response.status != Status::Idle;
        response.with_details(StrategyDetails::Ict(IctDetails {
            sweep,
            swing_high: high,
            swing_low: low,
            fvg,
            killzone,
            high_probability,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::testing::{candle, flat};

    fn sweep_series() -> Vec<Candle> {
        let mut candles = flat(25, 100.0);
        candles.push(candle(25, 100.0, 100.0, 90.0, 95.0, 1000.0));
        candles
    }

    fn details(r: &StrategyResponse) -> &IctDetails {
        match &r.details {
            StrategyDetails::Ict(d) => d,
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn bullish_sweep_enters_long_with_stop_at_wick() {
        let r = IctStrategy::default().evaluate(&sweep_series(), &MarketContext::new());
        assert_eq!(r.status, Status::Entry);
        assert_eq!(r.side, Some(Side::Long));
        assert_eq!(r.price_levels.stop_loss, Some(90.0));
        assert_eq!(r.price_levels.take_profit, Some(105.0));
        let d = details(&r);
        assert_eq!(d.sweep, Some(Direction::Bullish));
        // 1970-01-02 01:00 UTC is evening in New York
        assert_eq!(d.killzone, None);
        assert!(!d.high_probability);
    }

    #[test]
    fn weak_reclaim_is_not_a_sweep() {
        let mut candles = flat(25, 100.0);
        candles.push(candle(25, 100.0, 100.0, 90.0, 93.0, 1000.0));
        let r = IctStrategy::default().evaluate(&candles, &MarketContext::new());
        assert_ne!(r.status, Status::Entry);
    }

    #[test]
    fn bearish_sweep_enters_short() {
        let mut candles = flat(25, 100.0);
        candles.push(candle(25, 100.0, 110.0, 100.0, 104.0, 1000.0));
        let r = IctStrategy::default().evaluate(&candles, &MarketContext::new());
        assert_eq!(r.side, Some(Side::Short));
        assert_eq!(r.price_levels.stop_loss, Some(110.0));
    }

    #[test]
    fn open_gap_is_watched() {
        let mut candles = flat(25, 100.0);
        candles.push(candle(25, 100.0, 103.0, 99.9, 102.8, 1000.0));
        candles.push(candle(26, 102.8, 104.0, 101.0, 103.5, 1000.0));
        candles.push(candle(27, 103.5, 103.9, 102.9, 103.0, 1000.0));
        let r = IctStrategy::default().evaluate(&candles, &MarketContext::new());
        assert_eq!(r.status, Status::Watch);
        let gap = details(&r).fvg.unwrap();
        assert_eq!(gap.direction, Direction::Bullish);
        assert_eq!(gap.bottom, 100.0);
    }

    #[test]
    fn killzone_sweep_is_high_probability() {
        // shift the series so the sweep candle lands at 2024-01-15 09:45 EST
        let offset = 1_705_329_900_000 - 25 * 3_600_000;
        let candles: Vec<Candle> = sweep_series()
            .into_iter()
            .map(|c| Candle { time: c.time + offset, ..c })
            .collect();
        let r = IctStrategy::default().evaluate(&candles, &MarketContext::new());
        let d = details(&r);
        assert_eq!(d.killzone, Some(Killzone::NewYork));
        assert!(d.high_probability);
    }

    #[test]
    fn short_input_is_insufficient() {
        assert!(IctStrategy::default()
            .evaluate(&flat(20, 100.0), &MarketContext::new())
            .is_insufficient_data());
    }
}
