//! RSI/MFI confluence.
//!
//! Enters when both oscillators agree on an extreme: long when RSI and MFI are
//! both below `oversold`, short when both are above `overbought`. A single
//! oscillator at an extreme is only worth watching. With `soft_exit` enabled the
//! strategy asks to close any position once RSI settles back into the neutral
//! band.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::{mfi, rsi};
use crate::domain::strategy::{
    MarketContext, PriceLevels, Side, Strategy, StrategyDetails, StrategyParams, StrategyResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RsiMfiOptions {
    pub rsi_period: usize,
    pub mfi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// Percent below (long) or above (short) the entry.
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub soft_exit: bool,
    /// Inclusive RSI band that triggers the soft exit.
    pub neutral_low: f64,
    pub neutral_high: f64,
}

impl Default for RsiMfiOptions {
    fn default() -> Self {
        RsiMfiOptions {
            rsi_period: 14,
            mfi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
            stop_loss_pct: 3.0,
            take_profit_pct: 6.0,
            soft_exit: true,
            neutral_low: 45.0,
            neutral_high: 55.0,
        }
    }
}

impl RsiMfiOptions {
    pub fn from_params(params: &StrategyParams) -> Self {
        let d = RsiMfiOptions::default();
        RsiMfiOptions {
            rsi_period: params.count("rsi_period", d.rsi_period),
            mfi_period: params.count("mfi_period", d.mfi_period),
            oversold: params.number("oversold", d.oversold),
            overbought: params.number("overbought", d.overbought),
            stop_loss_pct: params.number("stop_loss_pct", d.stop_loss_pct),
            take_profit_pct: params.number("take_profit_pct", d.take_profit_pct),
            soft_exit: params.flag("soft_exit", d.soft_exit),
            neutral_low: params.number("neutral_low", d.neutral_low),
            neutral_high: params.number("neutral_high", d.neutral_high),
        }
    }

    pub fn to_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("rsi_period", self.rsi_period)
            .with("mfi_period", self.mfi_period)
            .with("oversold", self.oversold)
            .with("overbought", self.overbought)
            .with("stop_loss_pct", self.stop_loss_pct)
            .with("take_profit_pct", self.take_profit_pct)
            .with("soft_exit", self.soft_exit)
            .with("neutral_low", self.neutral_low)
            .with("neutral_high", self.neutral_high)
    }

    pub fn min_lookback(&self) -> usize {
        self.rsi_period.max(self.mfi_period) + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RsiMfiDetails {
    pub rsi: f64,
    pub mfi: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RsiMfiStrategy {
    options: RsiMfiOptions,
}

impl RsiMfiStrategy {
    pub fn new(options: RsiMfiOptions) -> Self {
        RsiMfiStrategy { options }
    }
}

impl Strategy for RsiMfiStrategy {
    fn name(&self) -> &str {
        "rsi_mfi"
    }

    fn evaluate(&self, window: &[Candle], _context: &MarketContext<'_>) -> StrategyResponse {
        let o = &self.options;
        let Some(last) = window.last() else {
            return StrategyResponse::insufficient_data();
        };
        if window.len() < o.min_lookback() {
            return StrategyResponse::insufficient_data();
        }

        let rsi = rsi(window, o.rsi_period).value;
        let mfi = mfi(window, o.mfi_period).value;
        if rsi.is_nan() || mfi.is_nan() {
            return StrategyResponse::insufficient_data();
        }
        let details = StrategyDetails::RsiMfi(RsiMfiDetails { rsi, mfi });

        let response = if rsi < o.oversold && mfi < o.oversold {
            StrategyResponse::entry(
                Side::Long,
                PriceLevels::from_percent(Side::Long, last.close, o.stop_loss_pct, o.take_profit_pct),
                format!("RSI {rsi:.1} and MFI {mfi:.1} oversold"),
            )
        } else if rsi > o.overbought && mfi > o.overbought {
            StrategyResponse::entry(
                Side::Short,
                PriceLevels::from_percent(Side::Short, last.close, o.stop_loss_pct, o.take_profit_pct),
                format!("RSI {rsi:.1} and MFI {mfi:.1} overbought"),
            )
        } else if o.soft_exit && (o.neutral_low..=o.neutral_high).contains(&rsi) {
            StrategyResponse::exit(None, format!("RSI {rsi:.1} back in neutral band"))
        } else if rsi < o.oversold || mfi < o.oversold {
            StrategyResponse::watch(format!("One oscillator oversold (RSI {rsi:.1}, MFI {mfi:.1})"))
        } else if rsi > o.overbought || mfi > o.overbought {
            StrategyResponse::watch(format!("One oscillator overbought (RSI {rsi:.1}, MFI {mfi:.1})"))
        } else {
            StrategyResponse::idle("No confluence")
        };
        response.with_details(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::testing::{flat, from_closes};
    use crate::domain::strategy::Status;

    fn run(candles: &[Candle]) -> StrategyResponse {
        RsiMfiStrategy::default().evaluate(candles, &MarketContext::new())
    }

    #[test]
    fn short_input_is_insufficient() {
        assert!(run(&[]).is_insufficient_data());
        assert!(run(&flat(14, 100.0)).is_insufficient_data());
        assert!(!run(&flat(15, 100.0)).is_insufficient_data());
    }

    #[test]
    fn falling_market_enters_long() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - 2.0 * i as f64).collect();
        let r = run(&from_closes(&closes, 1000.0));
        assert_eq!(r.status, Status::Entry);
        assert_eq!(r.side, Some(Side::Long));
        let close = *closes.last().unwrap();
        assert!((r.price_levels.stop_loss.unwrap() - close * 0.97).abs() < 1e-9);
        assert!((r.price_levels.take_profit.unwrap() - close * 1.06).abs() < 1e-9);
    }

    #[test]
    fn rising_market_enters_short() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + 2.0 * i as f64).collect();
        let r = run(&from_closes(&closes, 1000.0));
        assert_eq!(r.status, Status::Entry);
        assert_eq!(r.side, Some(Side::Short));
        assert!(r.price_levels.stop_loss.unwrap() > r.price_levels.entry.unwrap());
    }

    #[test]
    fn flat_market_soft_exits() {
        let r = run(&flat(30, 100.0));
        assert_eq!(r.status, Status::Exit);
        assert_eq!(r.side, None);
        match r.details {
            StrategyDetails::RsiMfi(d) => assert!((d.rsi - 50.0).abs() < 1e-9),
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn soft_exit_can_be_disabled() {
        let options = RsiMfiOptions {
            soft_exit: false,
            ..RsiMfiOptions::default()
        };
        let r = RsiMfiStrategy::new(options).evaluate(&flat(30, 100.0), &MarketContext::new());
        assert_eq!(r.status, Status::Idle);
    }

    #[test]
    fn params_round_trip_through_options() {
        let params = StrategyParams::new()
            .with("rsi_period", 7usize)
            .with("soft_exit", false);
        let options = RsiMfiOptions::from_params(&params);
        assert_eq!(options.rsi_period, 7);
        assert!(!options.soft_exit);
        assert_eq!(options.mfi_period, 14);
        assert_eq!(RsiMfiOptions::from_params(&options.to_params()), options);
    }
}
