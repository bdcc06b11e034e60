//! Candle data access port trait.

use crate::domain::candle::Candle;
use crate::domain::error::StratbenchError;

pub trait CandlePort {
    /// Full history for `symbol` at `interval`, ascending by time without duplicates.
    fn fetch_candles(&self, symbol: &str, interval: &str) -> Result<Vec<Candle>, StratbenchError>;

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, StratbenchError>;
}
