//! Port traits the domain depends on; implementations live in [`crate::adapters`].

pub mod candle_port;
pub mod config_port;
