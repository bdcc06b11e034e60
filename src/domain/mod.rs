//! Core domain types and logic.

pub mod backtest;
pub mod candle;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod metrics;
pub mod optimizer;
pub mod position;
pub mod scanner;
pub mod strategy;
