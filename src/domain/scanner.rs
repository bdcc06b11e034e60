//! Historical signal scan for chart markers.
//!
//! Walks the series like the simulator does but never holds a position, so every
//! entry signal is reported, including ones the simulator would skip while a
//! trade is open.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::strategy::{bar_span, MarketContext, Side, Status, Strategy, StrategyDetails};

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub warmup: usize,
    /// Cap on the window handed to the strategy; `None` passes the full prefix.
    pub lookback: Option<usize>,
    pub include_watch: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            warmup: 50,
            lookback: None,
            include_watch: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarkerKind {
    Long,
    Short,
    Watch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalMarker {
    pub time: i64,
    pub price: f64,
    pub kind: MarkerKind,
    pub label: String,
    pub reason: String,
    pub details: StrategyDetails,
}

pub fn scan_signals(
    strategy: &dyn Strategy,
    candles: &[Candle],
    context: &MarketContext<'_>,
    config: &ScanConfig,
) -> Vec<SignalMarker> {
    let span = bar_span(candles);
    let mut markers = Vec::new();

    for i in config.warmup.min(candles.len())..candles.len() {
        let start = config
            .lookback
            .map_or(0, |lookback| (i + 1).saturating_sub(lookback));
        let candle = &candles[i];
        let response = strategy.evaluate(&candles[start..=i], &context.as_of(candle.time + span));

        let kind = match (response.status, response.side) {
            (Status::Entry, Some(Side::Short)) => MarkerKind::Short,
            (Status::Entry, _) => MarkerKind::Long,
            (Status::Watch, _) if config.include_watch => MarkerKind::Watch,
            _ => continue,
        };
        let label = match kind {
            MarkerKind::Long => "BUY",
            MarkerKind::Short => "SELL",
            MarkerKind::Watch => "WATCH",
        };
        markers.push(SignalMarker {
            time: candle.time,
            price: response.price_levels.entry.unwrap_or(candle.close),
            kind,
            label: label.to_string(),
            reason: response.reason,
            details: response.details,
        });
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::testing::{flat, HOUR_MS};
    use crate::domain::strategy::{PriceLevels, StrategyResponse};

    fn every_tenth(window: &[Candle], _: &MarketContext<'_>) -> StrategyResponse {
        match window.len() % 10 {
            0 => StrategyResponse::entry(Side::Long, PriceLevels::default(), "long"),
            5 => StrategyResponse::entry(Side::Short, PriceLevels::default(), "short"),
            3 => StrategyResponse::watch("watch"),
            _ => StrategyResponse::idle("idle"),
        }
    }

    fn window_len(window: &[Candle], _: &MarketContext<'_>) -> StrategyResponse {
        StrategyResponse::entry(Side::Long, PriceLevels::default(), window.len().to_string())
    }

    #[test]
    fn entries_become_markers() {
        let candles = flat(100, 100.0);
        let markers = scan_signals(&every_tenth, &candles, &MarketContext::new(), &ScanConfig::default());
        // windows 55, 60, ..., 100
        assert_eq!(markers.len(), 10);
        assert_eq!(markers[0].kind, MarkerKind::Short);
        assert_eq!(markers[0].time, 54 * HOUR_MS);
        assert_eq!(markers[0].label, "SELL");
        assert_eq!(markers[1].kind, MarkerKind::Long);
        assert_eq!(markers[1].price, 100.0);
    }

    #[test]
    fn watch_markers_are_optional() {
        let candles = flat(100, 100.0);
        let config = ScanConfig {
            include_watch: true,
            ..ScanConfig::default()
        };
        let markers = scan_signals(&every_tenth, &candles, &MarketContext::new(), &config);
        assert_eq!(markers.len(), 15);
        assert!(markers.iter().any(|m| m.kind == MarkerKind::Watch));
    }

    #[test]
    fn lookback_caps_window() {
        let candles = flat(80, 100.0);
        let config = ScanConfig {
            lookback: Some(20),
            ..ScanConfig::default()
        };
        let markers = scan_signals(&window_len, &candles, &MarketContext::new(), &config);
        assert_eq!(markers.len(), 30);
        assert!(markers.iter().all(|m| m.reason == "20"));
    }
}
