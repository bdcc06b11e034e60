//! Domain error types.
//!
//! Only the I/O and configuration surface produces errors. Insufficient history,
//! degenerate arithmetic and unknown strategy names are resolved into neutral
//! values inside the indicator and strategy layers instead.

/// Top-level error type for stratbench.
#[derive(Debug, thiserror::Error)]
pub enum StratbenchError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no candles for {symbol} ({interval})")]
    NoData { symbol: String, interval: String },

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("invalid parameter {key}: {reason}")]
    InvalidParam { key: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("json output error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<&StratbenchError> for std::process::ExitCode {
    fn from(err: &StratbenchError) -> Self {
        let code: u8 = match err {
            StratbenchError::Io(_) | StratbenchError::Json(_) => 1,
            StratbenchError::ConfigParse { .. }
            | StratbenchError::ConfigMissing { .. }
            | StratbenchError::ConfigInvalid { .. } => 2,
            StratbenchError::DataSource { .. } => 3,
            StratbenchError::UnknownStrategy { .. } | StratbenchError::InvalidParam { .. } => 4,
            StratbenchError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
