//! Named strategy table.
//!
//! Each entry carries display metadata, its default parameter map and a
//! constructor from a parameter map. Building a strategy merges caller
//! overrides over the defaults before the typed options are read.

use tracing::warn;

use crate::domain::candle::Candle;
use crate::domain::error::StratbenchError;
use crate::domain::strategy::bollinger_bounce::{BollingerBounceOptions, BollingerBounceStrategy};
use crate::domain::strategy::continuation_poi::{ContinuationPoiOptions, ContinuationPoiStrategy};
use crate::domain::strategy::convergence_ob::{ConvergenceObOptions, ConvergenceObStrategy};
use crate::domain::strategy::ema_crossover::{EmaCrossoverOptions, EmaCrossoverStrategy};
use crate::domain::strategy::golden::{GoldenOptions, GoldenStrategy};
use crate::domain::strategy::ict::{IctOptions, IctStrategy};
use crate::domain::strategy::macd_divergence::{MacdDivergenceOptions, MacdDivergenceStrategy};
use crate::domain::strategy::rsi_mfi::{RsiMfiOptions, RsiMfiStrategy};
use crate::domain::strategy::support_resistance::{
    SupportResistanceOptions, SupportResistanceStrategy,
};
use crate::domain::strategy::volume_breakout::{VolumeBreakoutOptions, VolumeBreakoutStrategy};
use crate::domain::strategy::{MarketContext, Strategy, StrategyParams, StrategyResponse};

type Builder = fn(&StrategyParams) -> Box<dyn Strategy>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyInfo {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

pub struct RegistryEntry {
    pub info: StrategyInfo,
    defaults: StrategyParams,
    build: Builder,
}

impl RegistryEntry {
    pub fn defaults(&self) -> &StrategyParams {
        &self.defaults
    }

    /// Build with `overrides` merged over the defaults.
    pub fn build(&self, overrides: &StrategyParams) -> Box<dyn Strategy> {
        for key in overrides.keys() {
            if !self.defaults.contains(key) {
                warn!(strategy = self.info.name, key, "ignoring unknown parameter");
            }
        }
        (self.build)(&self.defaults.merged(overrides))
    }
}

pub struct StrategyRegistry {
    entries: Vec<RegistryEntry>,
}

impl StrategyRegistry {
    /// Registry holding every built-in strategy, in display order.
    pub fn builtin() -> Self {
        let entries = vec![
            RegistryEntry {
                info: StrategyInfo {
                    name: "rsi_mfi",
                    title: "RSI/MFI Confluence",
                    description: "Both oscillators oversold (overbought) at once",
                },
                defaults: RsiMfiOptions::default().to_params(),
                build: |p| Box::new(RsiMfiStrategy::new(RsiMfiOptions::from_params(p))),
            },
            RegistryEntry {
                info: StrategyInfo {
                    name: "bollinger_bounce",
                    title: "Bollinger Bounce",
                    description: "Band touch with RSI extreme, targeting the middle band",
                },
                defaults: BollingerBounceOptions::default().to_params(),
                build: |p| {
                    Box::new(BollingerBounceStrategy::new(BollingerBounceOptions::from_params(p)))
                },
            },
            RegistryEntry {
                info: StrategyInfo {
                    name: "macd_divergence",
                    title: "MACD Divergence",
                    description: "Price/histogram pivot divergence confirmed by a MACD cross",
                },
                defaults: MacdDivergenceOptions::default().to_params(),
                build: |p| {
                    Box::new(MacdDivergenceStrategy::new(MacdDivergenceOptions::from_params(p)))
                },
            },
            RegistryEntry {
                info: StrategyInfo {
                    name: "ema_crossover",
                    title: "EMA Crossover",
                    description: "Golden and death crosses of the 50/200 EMA",
                },
                defaults: EmaCrossoverOptions::default().to_params(),
                build: |p| Box::new(EmaCrossoverStrategy::new(EmaCrossoverOptions::from_params(p))),
            },
            RegistryEntry {
                info: StrategyInfo {
                    name: "volume_breakout",
                    title: "Volume Breakout",
                    description: "Range breakout confirmed by a volume spike",
                },
                defaults: VolumeBreakoutOptions::default().to_params(),
                build: |p| {
                    Box::new(VolumeBreakoutStrategy::new(VolumeBreakoutOptions::from_params(p)))
                },
            },
            RegistryEntry {
                info: StrategyInfo {
                    name: "support_resistance",
                    title: "Support/Resistance",
                    description: "Confirmed break of a clustered pivot level",
                },
                defaults: SupportResistanceOptions::default().to_params(),
                build: |p| {
                    Box::new(SupportResistanceStrategy::new(
                        SupportResistanceOptions::from_params(p),
                    ))
                },
            },
            RegistryEntry {
                info: StrategyInfo {
                    name: "golden",
                    title: "Golden Strategy",
                    description: "Trend pullback through the lower band with ADX and RSI filters",
                },
                defaults: GoldenOptions::default().to_params(),
                build: |p| Box::new(GoldenStrategy::new(GoldenOptions::from_params(p))),
            },
            RegistryEntry {
                info: StrategyInfo {
                    name: "ict",
                    title: "ICT/SMC",
                    description: "Liquidity sweep entries, open fair value gaps watched",
                },
                defaults: IctOptions::default().to_params(),
                build: |p| Box::new(IctStrategy::new(IctOptions::from_params(p))),
            },
            RegistryEntry {
                info: StrategyInfo {
                    name: "convergence_ob",
                    title: "Convergence Order Block",
                    description: "RSI and MFI extremes inside an active order block",
                },
                defaults: ConvergenceObOptions::default().to_params(),
                build: |p| Box::new(ConvergenceObStrategy::new(ConvergenceObOptions::from_params(p))),
            },
            RegistryEntry {
                info: StrategyInfo {
                    name: "continuation_poi",
                    title: "Continuation POI",
                    description: "Higher timeframe bias, entry on retrace into an aligned FVG",
                },
                defaults: ContinuationPoiOptions::default().to_params(),
                build: |p| {
                    Box::new(ContinuationPoiStrategy::new(ContinuationPoiOptions::from_params(p)))
                },
            },
        ];
        StrategyRegistry { entries }
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.info.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.info.name).collect()
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn build(&self, name: &str, overrides: &StrategyParams) -> Option<Box<dyn Strategy>> {
        self.get(name).map(|e| e.build(overrides))
    }

    /// Like [`build`](Self::build) but reports an unknown name as an error.
    pub fn try_build(
        &self,
        name: &str,
        overrides: &StrategyParams,
    ) -> Result<Box<dyn Strategy>, StratbenchError> {
        self.build(name, overrides)
            .ok_or_else(|| StratbenchError::UnknownStrategy {
                name: name.to_string(),
            })
    }

    /// Evaluate a named strategy once. An unknown name yields an idle response.
    pub fn execute(
        &self,
        name: &str,
        candles: &[Candle],
        context: &MarketContext<'_>,
        overrides: &StrategyParams,
    ) -> StrategyResponse {
        match self.build(name, overrides) {
            Some(strategy) => strategy.evaluate(candles, context),
            None => StrategyResponse::idle(format!("Unknown strategy: {name}")),
        }
    }
}

/// Evaluate a built-in strategy on `candles` without higher timeframe data.
pub fn execute_strategy(name: &str, candles: &[Candle], overrides: &StrategyParams) -> StrategyResponse {
    StrategyRegistry::builtin().execute(name, candles, &MarketContext::new(), overrides)
}
