//! Row encoder configuration: settings plus null-marker and delimiter overrides.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::settings::EncodingSettings;
use crate::error::EncodingError;

/// Delimiter used for text rows when none is set.
pub const DEFAULT_DELIMITER: &str = "|";

/// Null marker used for text rows when none is set.
pub const DEFAULT_NULL: &str = "NULL";

/// A value supplied for the null marker or delimiter.
///
/// Embedding callers may hand over any scalar; the encoder decides which kinds it
/// can represent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideValue {
    /// No value. As a null marker this emits nothing for null fields.
    Null,
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl OverrideValue {
    fn kind_name(&self) -> &'static str {
        match self {
            OverrideValue::Null => "null",
            OverrideValue::Text(_) => "text",
            OverrideValue::Integer(_) => "integer",
            OverrideValue::Boolean(_) => "boolean",
        }
    }
}

impl From<&str> for OverrideValue {
    fn from(v: &str) -> Self {
        OverrideValue::Text(v.to_string())
    }
}

impl From<String> for OverrideValue {
    fn from(v: String) -> Self {
        OverrideValue::Text(v)
    }
}

impl From<Option<&str>> for OverrideValue {
    fn from(v: Option<&str>) -> Self {
        v.map_or(OverrideValue::Null, OverrideValue::from)
    }
}

impl From<i64> for OverrideValue {
    fn from(v: i64) -> Self {
        OverrideValue::Integer(v)
    }
}

impl From<bool> for OverrideValue {
    fn from(v: bool) -> Self {
        OverrideValue::Boolean(v)
    }
}

/// Encoder configuration handed to the transport at initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowEncoder {
    settings: EncodingSettings,
    /// `None` renders null fields as empty text.
    null: Option<String>,
    delimiter: String,
}

impl Default for RowEncoder {
    fn default() -> Self {
        Self {
            settings: EncodingSettings::default(),
            null: Some(DEFAULT_NULL.to_string()),
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

impl RowEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn settings(&self) -> EncodingSettings {
        self.settings
    }

    #[must_use]
    pub fn null(&self) -> Option<&str> {
        self.null.as_deref()
    }

    #[must_use]
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Merges `requested` into the current settings.
    ///
    /// On error the settings are unchanged.
    pub fn set_encoding(&mut self, requested: u32) -> Result<EncodingSettings, EncodingError> {
        self.settings = self.settings.merge(requested)?;
        Ok(self.settings)
    }

    /// Sets the text emitted for null fields.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError::InvalidNull` for non-text values, markers containing
    /// line breaks, and markers equal to the delimiter.
    pub fn set_null(&mut self, value: OverrideValue) -> Result<(), EncodingError> {
        let null = parse_null(value)?;
        if null.as_deref() == Some(self.delimiter.as_str()) {
            return Err(EncodingError::InvalidNull(format!(
                "null marker cannot equal the delimiter '{}'",
                self.delimiter
            )));
        }
        self.null = null;
        Ok(())
    }

    /// Sets the field delimiter for text rows.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError::InvalidDelimiter` for non-text or empty values,
    /// delimiters containing line breaks, and delimiters equal to the null marker.
    pub fn set_delimiter(&mut self, value: OverrideValue) -> Result<(), EncodingError> {
        let text = parse_delimiter(value)?;
        if self.null.as_deref() == Some(text.as_str()) {
            return Err(EncodingError::InvalidDelimiter(format!(
                "delimiter cannot equal the null marker '{text}'"
            )));
        }
        self.delimiter = text;
        Ok(())
    }

    /// Sets the null marker and delimiter together.
    ///
    /// Only the resulting pair has to be distinct, so swapping the two values
    /// in one call is allowed. Nothing changes on error.
    ///
    /// # Errors
    ///
    /// Same as [`set_null`](Self::set_null) and [`set_delimiter`](Self::set_delimiter).
    pub fn set_overrides(
        &mut self,
        null: Option<OverrideValue>,
        delimiter: Option<OverrideValue>,
    ) -> Result<(), EncodingError> {
        let next_null = match null {
            Some(value) => parse_null(value)?,
            None => self.null.clone(),
        };
        let delimiter_given = delimiter.is_some();
        let next_delimiter = match delimiter {
            Some(value) => parse_delimiter(value)?,
            None => self.delimiter.clone(),
        };

        if next_null.as_deref() == Some(next_delimiter.as_str()) {
            let message = format!("null marker and delimiter are both '{next_delimiter}'");
            return Err(if delimiter_given {
                EncodingError::InvalidDelimiter(message)
            } else {
                EncodingError::InvalidNull(message)
            });
        }
        self.null = next_null;
        self.delimiter = next_delimiter;
        Ok(())
    }

    /// Joins column names into a header line using the delimiter.
    #[must_use]
    pub fn header<'a, I>(&self, names: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().collect::<Vec<_>>().join(&self.delimiter)
    }
}

impl fmt::Display for RowEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "encoding={} delimiter={:?} null={:?}",
            self.settings, self.delimiter, self.null
        )
    }
}

fn has_line_break(text: &str) -> bool {
    text.contains('\n') || text.contains('\r')
}

fn parse_null(value: OverrideValue) -> Result<Option<String>, EncodingError> {
    match value {
        OverrideValue::Null => Ok(None),
        OverrideValue::Text(text) if has_line_break(&text) => Err(EncodingError::InvalidNull(
            "null marker cannot contain line breaks".to_string(),
        )),
        OverrideValue::Text(text) => Ok(Some(text)),
        other => Err(EncodingError::InvalidNull(format!(
            "expected text or null, got {}",
            other.kind_name()
        ))),
    }
}

fn parse_delimiter(value: OverrideValue) -> Result<String, EncodingError> {
    let text = match value {
        OverrideValue::Text(text) => text,
        other => {
            return Err(EncodingError::InvalidDelimiter(format!(
                "expected text, got {}",
                other.kind_name()
            )))
        }
    };
    if text.is_empty() {
        return Err(EncodingError::InvalidDelimiter(
            "delimiter cannot be empty".to_string(),
        ));
    }
    if has_line_break(&text) {
        return Err(EncodingError::InvalidDelimiter(
            "delimiter cannot contain line breaks".to_string(),
        ));
    }
    Ok(text)
}
