//! Strategy parameter maps.
//!
//! Parameters travel as an ordered string-keyed map so the optimizer, config file,
//! and CLI can address them uniformly. Each strategy converts the map into its own
//! typed options struct with `from_params`, falling back to its defaults for keys
//! that are absent or of the wrong kind.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::StratbenchError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl ParamValue {
    /// Parse a raw string: booleans first, then numbers, otherwise text.
    pub fn parse(raw: &str) -> ParamValue {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => return ParamValue::Flag(true),
            "false" | "no" | "off" => return ParamValue::Flag(false),
            _ => {}
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => ParamValue::Number(n),
            _ => ParamValue::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Flag(b) => Some(*b),
            ParamValue::Number(n) => Some(*n != 0.0),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Flag(b) => write!(f, "{b}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Number(v as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Flag(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, ParamValue>);

impl StrategyParams {
    pub fn new() -> Self {
        StrategyParams::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn number(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(ParamValue::as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    /// Numeric parameter rounded to a count; negative values clamp to zero.
    pub fn count(&self, key: &str, default: usize) -> usize {
        match self.get(key).and_then(ParamValue::as_f64) {
            Some(v) if v.is_finite() => v.max(0.0).round() as usize,
            _ => default,
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(ParamValue::as_bool).unwrap_or(default)
    }

    pub fn text(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(ParamValue::Text(s)) => s.clone(),
            Some(ParamValue::Number(n)) => n.to_string(),
            _ => default.to_string(),
        }
    }

    /// Keys of `overrides` replace keys of `self`; everything else is kept.
    pub fn merged(&self, overrides: &StrategyParams) -> StrategyParams {
        let mut out = self.clone();
        for (k, v) in &overrides.0 {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read every key of an INI section as a parameter override.
    pub fn from_config(config: &dyn ConfigPort, section: &str) -> StrategyParams {
        let mut params = StrategyParams::new();
        for key in config.keys(section) {
            if let Some(raw) = config.get_string(section, &key) {
                params.set(&key, ParamValue::parse(&raw));
            }
        }
        params
    }
}

impl fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

/// Parse a `key=value` assignment as given on the command line.
pub fn parse_assignment(raw: &str) -> Result<(String, ParamValue), StratbenchError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(StratbenchError::InvalidParam {
            key: raw.to_string(),
            reason: "expected key=value".to_string(),
        });
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(StratbenchError::InvalidParam {
            key: raw.to_string(),
            reason: "empty key".to_string(),
        });
    }
    Ok((key.to_string(), ParamValue::parse(value)))
}
