//! Options applied when a session is constructed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeValue, SessionDefaults};
use crate::encoding::OverrideValue;

/// Default number of additional attempts for an unavailable buffer.
pub const DEFAULT_BUFFER_RETRY_LIMIT: u32 = 3;

/// Options for creating an [`ExportSession`](super::ExportSession).
///
/// # Example
///
/// ```ignore
/// let options = SessionOptions::new()
///     .with_encoding(VALUES)
///     .with_delimiter("\t")
///     .with_attribute("max-sessions", 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Attribute defaults copied into the session.
    pub defaults: SessionDefaults,
    /// Attribute overrides by key name, applied after the defaults.
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Encoding bitmask merged into the default settings.
    pub encoding: Option<u32>,
    /// Null marker override.
    pub null: Option<OverrideValue>,
    /// Field delimiter override.
    pub delimiter: Option<String>,
    /// Additional attempts for a buffer that is temporarily unavailable (default: 3).
    pub buffer_retry_limit: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            defaults: SessionDefaults::production(),
            attributes: BTreeMap::new(),
            encoding: None,
            null: None,
            delimiter: None,
            buffer_retry_limit: DEFAULT_BUFFER_RETRY_LIMIT,
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON. Missing fields keep their default.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: SessionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: u32) -> Self {
        self.encoding = Some(encoding);
        self
    }

    #[must_use]
    pub fn with_null(mut self, null: impl Into<OverrideValue>) -> Self {
        self.null = Some(null.into());
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: &str) -> Self {
        self.delimiter = Some(delimiter.to_string());
        self
    }

    #[must_use]
    pub fn with_buffer_retry_limit(mut self, limit: u32) -> Self {
        self.buffer_retry_limit = limit;
        self
    }
}
