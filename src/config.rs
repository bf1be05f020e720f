//! Run configuration.
//!
//! Everything a run depends on (headers, output path, timeout, resolution)
//! is passed in through [`ConvertOptions`]; nothing is read from globals.

use crate::error::ConvertError;
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUTPUT_FILE: &str = "output.pdf";
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
pub const DEFAULT_DPI: f64 = 100.0;

/// Static headers attached verbatim to every request of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: BTreeMap<String, String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header, replacing any earlier value for the same name.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), ConvertError> {
        let name = name.trim();
        let value = value.trim();

        // HeaderName lowercases, so `Cookie` and `cookie` share one entry.
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConvertError::InvalidConfig(format!("invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            ConvertError::InvalidConfig(format!("invalid value for header '{}'", name))
        })?;

        self.entries.insert(name.as_str().to_string(), value.to_string());
        Ok(())
    }

    /// Parses a `Name: Value` line as given on the command line.
    pub fn insert_line(&mut self, line: &str) -> Result<(), ConvertError> {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            ConvertError::InvalidConfig(format!("header '{}' is not in 'Name: Value' form", line))
        })?;
        self.insert(name, value)
    }

    /// Merges a JSON object of string values, e.g. `{"User-Agent": "..."}`.
    pub fn extend_from_json(&mut self, json: &str) -> Result<(), ConvertError> {
        let map: BTreeMap<String, String> = serde_json::from_str(json).map_err(|e| {
            ConvertError::InvalidConfig(format!("headers file must be a JSON object of strings: {}", e))
        })?;

        for (name, value) in &map {
            self.insert(name, value)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub headers: RequestHeaders,
    /// Overwritten on every successful run.
    pub output_path: PathBuf,
    /// Applied to each GET separately.
    pub timeout: Duration,
    /// Pixels per inch used to size each page.
    pub dpi: f64,
}

impl ConvertOptions {
    pub fn new(
        output_path: impl Into<PathBuf>,
        headers: RequestHeaders,
        timeout_seconds: f64,
    ) -> Result<Self, ConvertError> {
        let timeout = Duration::try_from_secs_f64(timeout_seconds)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or_else(|| {
                ConvertError::InvalidConfig(format!(
                    "timeout must be a positive, finite number of seconds, got {}",
                    timeout_seconds
                ))
            })?;

        Ok(Self {
            headers,
            output_path: output_path.into(),
            timeout,
            dpi: DEFAULT_DPI,
        })
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            headers: RequestHeaders::default(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            dpi: DEFAULT_DPI,
        }
    }
}
