//! stratbench: technical-analysis strategy evaluation and backtesting.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;

pub use domain::backtest::{run_backtest, run_backtest_with_context, BacktestConfig, BacktestResult};
pub use domain::candle::Candle;
pub use domain::error::StratbenchError;
pub use domain::optimizer::optimize_strategy;
pub use domain::scanner::scan_signals;
pub use domain::strategy::registry::execute_strategy;
