//! Strategy evaluation contract.
//!
//! A strategy is a pure function of a candle window (plus optional higher
//! timeframe candles) to a [`StrategyResponse`]. It keeps no state between calls;
//! whoever holds a position (the backtest simulator, the scanner, a live caller)
//! owns that memory.
//!
//! The response is a common envelope so callers can stay strategy-agnostic, with
//! strategy-specific readings carried in the [`StrategyDetails`] tagged union.

pub mod bollinger_bounce;
pub mod continuation_poi;
pub mod convergence_ob;
pub mod ema_crossover;
pub mod golden;
pub mod ict;
pub mod macd_divergence;
pub mod params;
pub mod patterns;
pub mod registry;
pub mod rsi_mfi;
pub mod support_resistance;
pub mod volume_breakout;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::candle::Candle;

pub use params::{ParamValue, StrategyParams};
pub use registry::{StrategyInfo, StrategyRegistry};

/// Reason attached to every response produced without enough history.
pub const INSUFFICIENT_DATA: &str = "Insufficient Data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Idle,
    Watch,
    Entry,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "IDLE"),
            Status::Watch => write!(f, "WATCH"),
            Status::Entry => write!(f, "ENTRY"),
            Status::Exit => write!(f, "EXIT"),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PriceLevels {
    pub entry: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl PriceLevels {
    pub fn new(entry: f64, stop_loss: f64, take_profit: f64) -> Self {
        PriceLevels {
            entry: Some(entry),
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        }
    }

    /// Levels with a take-profit placed `reward_risk` times the entry/stop distance away.
    pub fn from_risk(side: Side, entry: f64, stop_loss: f64, reward_risk: f64) -> Self {
        let risk = (entry - stop_loss).abs();
        PriceLevels::new(entry, stop_loss, entry + side.sign() * risk * reward_risk)
    }

    /// Levels at fixed percentages from the entry on the side's loss and profit.
    pub fn from_percent(side: Side, entry: f64, stop_pct: f64, target_pct: f64) -> Self {
        let s = side.sign();
        PriceLevels::new(
            entry,
            entry * (1.0 - s * stop_pct / 100.0),
            entry * (1.0 + s * target_pct / 100.0),
        )
    }
}

/// Strategy-specific readings, one variant per strategy family.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyDetails {
    #[default]
    None,
    RsiMfi(rsi_mfi::RsiMfiDetails),
    BollingerBounce(bollinger_bounce::BollingerBounceDetails),
    MacdDivergence(macd_divergence::MacdDivergenceDetails),
    EmaCrossover(ema_crossover::EmaCrossoverDetails),
    VolumeBreakout(volume_breakout::VolumeBreakoutDetails),
    SupportResistance(support_resistance::SupportResistanceDetails),
    Golden(golden::GoldenDetails),
    Ict(ict::IctDetails),
    ConvergenceOb(convergence_ob::ConvergenceObDetails),
    ContinuationPoi(continuation_poi::ContinuationPoiDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyResponse {
    pub status: Status,
    pub price_levels: PriceLevels,
    pub reason: String,
    /// Always set on `Entry`. On `Exit` it names the side to close; `None` closes any.
    pub side: Option<Side>,
    pub details: StrategyDetails,
}

impl StrategyResponse {
    pub fn idle(reason: impl Into<String>) -> Self {
        StrategyResponse {
            status: Status::Idle,
            price_levels: PriceLevels::default(),
            reason: reason.into(),
            side: None,
            details: StrategyDetails::None,
        }
    }

    pub fn insufficient_data() -> Self {
        Self::idle(INSUFFICIENT_DATA)
    }

    pub fn watch(reason: impl Into<String>) -> Self {
        StrategyResponse {
            status: Status::Watch,
            ..Self::idle(reason)
        }
    }

    pub fn entry(side: Side, levels: PriceLevels, reason: impl Into<String>) -> Self {
        StrategyResponse {
            status: Status::Entry,
            price_levels: levels,
            reason: reason.into(),
            side: Some(side),
            details: StrategyDetails::None,
        }
    }

    pub fn exit(side: Option<Side>, reason: impl Into<String>) -> Self {
        StrategyResponse {
            status: Status::Exit,
            side,
            ..Self::idle(reason)
        }
    }

    pub fn with_details(mut self, details: StrategyDetails) -> Self {
        self.details = details;
        self
    }

    pub fn is_insufficient_data(&self) -> bool {
        self.status == Status::Idle && self.reason == INSUFFICIENT_DATA
    }
}

/// Auxiliary candle series keyed by timeframe label, as supplied by the data layer.
pub type Timeframes = BTreeMap<String, Vec<Candle>>;

/// Borrowed view of the higher-timeframe series available to a strategy call.
#[derive(Debug, Clone, Default)]
pub struct MarketContext<'a> {
    timeframes: BTreeMap<&'a str, &'a [Candle]>,
}

impl<'a> MarketContext<'a> {
    pub fn new() -> Self {
        MarketContext::default()
    }

    pub fn from_timeframes(timeframes: &'a Timeframes) -> Self {
        MarketContext {
            timeframes: timeframes
                .iter()
                .map(|(label, candles)| (label.as_str(), candles.as_slice()))
                .collect(),
        }
    }

    pub fn with(mut self, label: &'a str, candles: &'a [Candle]) -> Self {
        self.timeframes.insert(label, candles);
        self
    }

    pub fn get(&self, label: &str) -> Option<&'a [Candle]> {
        self.timeframes.get(label).copied()
    }

    /// Restrict every series to candles already closed at `time`.
    ///
    /// A candle counts as closed once `candle.time + span <= time`. The span is
    /// the series' bar spacing, or the label's interval (`15m`, `4h`, `1d`) when
    /// the series is too short to measure. A series with neither exposes nothing.
    pub fn as_of(&self, time: i64) -> MarketContext<'a> {
        MarketContext {
            timeframes: self
                .timeframes
                .iter()
                .map(|(label, candles)| {
                    let span = Some(bar_span(candles))
                        .filter(|span| *span > 0)
                        .or_else(|| interval_span(label));
                    let cut = match span {
                        Some(span) => candles.partition_point(|c| c.time + span <= time),
                        None => 0,
                    };
                    (*label, &candles[..cut])
                })
                .collect(),
        }
    }
}

/// Length in milliseconds of an interval label such as `30s`, `15m`, `4h`, `1d` or `1w`.
pub fn interval_span(label: &str) -> Option<i64> {
    let split = label.find(|c: char| !c.is_ascii_digit())?;
    let (count, unit) = label.split_at(split);
    let count: i64 = count.parse().ok()?;
    let unit_ms = match unit {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" | "D" => 86_400_000,
        "w" | "W" => 604_800_000,
        _ => return None,
    };
    count.checked_mul(unit_ms).filter(|span| *span > 0)
}

/// Spacing between consecutive candles in milliseconds, 0 when it cannot be inferred.
pub fn bar_span(candles: &[Candle]) -> i64 {
    match candles {
        [a, b, ..] => (b.time - a.time).max(0),
        _ => 0,
    }
}

/// A trading decision function over a point-in-time candle window.
pub trait Strategy: Send + Sync {
    fn evaluate(&self, window: &[Candle], context: &MarketContext<'_>) -> StrategyResponse;

    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> Strategy for F
where
    F: Fn(&[Candle], &MarketContext<'_>) -> StrategyResponse + Send + Sync,
{
    fn evaluate(&self, window: &[Candle], context: &MarketContext<'_>) -> StrategyResponse {
        self(window, context)
    }
}
