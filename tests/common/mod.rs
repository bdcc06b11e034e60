#![allow(dead_code)]

use stratbench::domain::candle::Candle;
use stratbench::domain::error::StratbenchError;
use stratbench::ports::candle_port::CandlePort;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

pub const HOUR_MS: i64 = 3_600_000;

pub struct MockCandlePort {
    pub data: HashMap<(String, String), Vec<Candle>>,
}

impl MockCandlePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, symbol: &str, interval: &str, candles: Vec<Candle>) -> Self {
        self.data
            .insert((symbol.to_string(), interval.to_string()), candles);
        self
    }
}

impl CandlePort for MockCandlePort {
    fn fetch_candles(&self, symbol: &str, interval: &str) -> Result<Vec<Candle>, StratbenchError> {
        self.data
            .get(&(symbol.to_string(), interval.to_string()))
            .cloned()
            .ok_or_else(|| StratbenchError::NoData {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            })
    }

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, StratbenchError> {
        let mut symbols: Vec<String> = self
            .data
            .keys()
            .filter(|(_, i)| i == interval)
            .map(|(s, _)| s.clone())
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn make_candle(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle {
        time: i as i64 * HOUR_MS,
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Candles with a 1.0 range around each close.
pub fn from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(i, c, c + 0.5, c - 0.5, c, 1000.0))
        .collect()
}

pub fn flat(n: usize, price: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| make_candle(i, price, price, price, price, 1000.0))
        .collect()
}

/// Deterministic trending, oscillating series with varying ranges and volume.
pub fn synthetic(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 0.03 * x + 8.0 * (x / 17.0).sin() + 3.0 * (x / 5.0).cos();
            let open = close - 1.2 * (x / 3.0).sin();
            let wick = 0.6 + 0.4 * (x / 7.0).cos().abs();
            make_candle(
                i,
                open,
                open.max(close) + wick,
                open.min(close) - wick,
                close,
                1000.0 + 600.0 * (x / 11.0).sin().abs(),
            )
        })
        .collect()
}

/// Aggregate consecutive groups of `factor` candles into one.
pub fn resample(candles: &[Candle], factor: usize) -> Vec<Candle> {
    candles
        .chunks(factor)
        .map(|chunk| Candle {
            time: chunk[0].time,
            open: chunk[0].open,
            high: chunk.iter().map(|c| c.high).fold(f64::MIN, f64::max),
            low: chunk.iter().map(|c| c.low).fold(f64::MAX, f64::min),
            close: chunk[chunk.len() - 1].close,
            volume: chunk.iter().map(|c| c.volume).sum(),
        })
        .collect()
}

pub fn write_csv(dir: &Path, symbol: &str, interval: &str, candles: &[Candle]) {
    let mut content = String::from("time,open,high,low,close,volume\n");
    for c in candles {
        writeln!(
            content,
            "{},{},{},{},{},{}",
            c.time, c.open, c.high, c.low, c.close, c.volume
        )
        .unwrap();
    }
    std::fs::write(dir.join(format!("{symbol}_{interval}.csv")), content).unwrap();
}
