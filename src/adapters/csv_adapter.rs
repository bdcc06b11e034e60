//! CSV file candle adapter.
//!
//! Reads `<base>/<SYMBOL>_<interval>.csv` files with the header
//! `time,open,high,low,close,volume`, where `time` is the bucket open in epoch
//! milliseconds.

use crate::domain::candle::Candle;
use crate::domain::error::StratbenchError;
use crate::ports::candle_port::CandlePort;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }
}

impl CandlePort for CsvAdapter {
    fn fetch_candles(&self, symbol: &str, interval: &str) -> Result<Vec<Candle>, StratbenchError> {
        let path = self.csv_path(symbol, interval);
        let mut rdr = csv::Reader::from_path(&path).map_err(|e| StratbenchError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut candles = Vec::new();
        for result in rdr.deserialize::<Candle>() {
            let candle = result.map_err(|e| StratbenchError::DataSource {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            candles.push(candle);
        }

        if candles.is_empty() {
            return Err(StratbenchError::NoData {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            });
        }

        candles.sort_by_key(|c| c.time);
        if let Some(pair) = candles.windows(2).find(|w| w[0].time == w[1].time) {
            return Err(StratbenchError::DataSource {
                reason: format!("duplicate timestamp {} in {}", pair[0].time, path.display()),
            });
        }

        debug!(symbol, interval, candles = candles.len(), "loaded candles");
        Ok(candles)
    }

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, StratbenchError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| StratbenchError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", interval);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| StratbenchError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
