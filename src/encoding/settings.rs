//! Encoding settings and the category-scoped bitmask merge.
//!
//! The transport boundary speaks a packed `u32` split into three disjoint byte
//! ranges:
//!
//! ```text
//! bits 23..16  decimal-return   (DECIMAL_RETURN_MASK)
//! bits 15..8   datetime-return  (DATETIME_RETURN_MASK)
//! bits  7..0   row-return       (ROW_RETURN_MASK)
//! ```
//!
//! Inside the crate the settings are three named fields, so updating one category
//! cannot touch the others.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

pub const ROW_RETURN_MASK: u32 = 0x0000_00FF;
pub const DATETIME_RETURN_MASK: u32 = 0x0000_FF00;
pub const DECIMAL_RETURN_MASK: u32 = 0x00FF_0000;

pub const ROW_ENCODING_STRING: u32 = 0x0000_0001;
pub const ROW_ENCODING_DICT: u32 = 0x0000_0002;
pub const ROW_ENCODING_LIST: u32 = 0x0000_0004;
pub const ROW_ENCODING_RAW: u32 = 0x0000_0008;

pub const DATETIME_AS_STRING: u32 = 0x0000_0100;
pub const DATETIME_AS_NATIVE: u32 = 0x0000_0200;

pub const DECIMAL_AS_STRING: u32 = 0x0001_0000;
pub const DECIMAL_AS_FLOAT: u32 = 0x0002_0000;
pub const DECIMAL_AS_NATIVE: u32 = 0x0004_0000;

/// Delimited text rows with every value rendered as a string.
pub const STRINGS: u32 = ROW_ENCODING_STRING | DATETIME_AS_STRING | DECIMAL_AS_STRING;
/// Rows as ordered value lists.
pub const VALUES: u32 = ROW_ENCODING_LIST;
/// Rows as column-name to value maps.
pub const ITEMS: u32 = ROW_ENCODING_DICT;
/// Rows passed through unmodified, for archiving.
pub const ARCHIVE: u32 = ROW_ENCODING_RAW | DATETIME_AS_STRING | DECIMAL_AS_STRING;

/// How rows are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowEncoding {
    String,
    Dict,
    List,
    Raw,
}

/// How date, time and timestamp values are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatetimeEncoding {
    String,
    Native,
}

/// How decimal values are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalEncoding {
    String,
    Float,
    Native,
}

impl RowEncoding {
    pub const ALL: [RowEncoding; 4] = [
        RowEncoding::String,
        RowEncoding::Dict,
        RowEncoding::List,
        RowEncoding::Raw,
    ];

    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            RowEncoding::String => ROW_ENCODING_STRING,
            RowEncoding::Dict => ROW_ENCODING_DICT,
            RowEncoding::List => ROW_ENCODING_LIST,
            RowEncoding::Raw => ROW_ENCODING_RAW,
        }
    }

    fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.bits() == bits)
    }
}

impl DatetimeEncoding {
    pub const ALL: [DatetimeEncoding; 2] = [DatetimeEncoding::String, DatetimeEncoding::Native];

    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            DatetimeEncoding::String => DATETIME_AS_STRING,
            DatetimeEncoding::Native => DATETIME_AS_NATIVE,
        }
    }

    fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.bits() == bits)
    }
}

impl DecimalEncoding {
    pub const ALL: [DecimalEncoding; 3] = [
        DecimalEncoding::String,
        DecimalEncoding::Float,
        DecimalEncoding::Native,
    ];

    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            DecimalEncoding::String => DECIMAL_AS_STRING,
            DecimalEncoding::Float => DECIMAL_AS_FLOAT,
            DecimalEncoding::Native => DECIMAL_AS_NATIVE,
        }
    }

    fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.bits() == bits)
    }
}

/// Current encoding of the three return categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodingSettings {
    pub row: RowEncoding,
    pub datetime: DatetimeEncoding,
    pub decimal: DecimalEncoding,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            row: RowEncoding::String,
            datetime: DatetimeEncoding::String,
            decimal: DecimalEncoding::String,
        }
    }
}

impl EncodingSettings {
    /// Packs the settings into the transport's bitmask.
    #[must_use]
    pub fn bits(&self) -> u32 {
        self.row.bits() | self.datetime.bits() | self.decimal.bits()
    }

    /// Unpacks a complete bitmask. Every category must be present.
    pub fn from_bits(bits: u32) -> Result<Self, EncodingError> {
        let unsupported = |reason: &str| EncodingError::UnsupportedEncoding {
            requested: bits,
            reason: reason.to_string(),
        };
        check_unknown_bits(bits)?;
        let settings = Self {
            row: RowEncoding::from_bits(bits & ROW_RETURN_MASK)
                .ok_or_else(|| unsupported("row category must hold exactly one value"))?,
            datetime: DatetimeEncoding::from_bits(bits & DATETIME_RETURN_MASK)
                .ok_or_else(|| unsupported("datetime category must hold exactly one value"))?,
            decimal: DecimalEncoding::from_bits(bits & DECIMAL_RETURN_MASK)
                .ok_or_else(|| unsupported("decimal category must hold exactly one value"))?,
        };
        settings.validate(bits)?;
        Ok(settings)
    }

    /// Merges `requested` into these settings.
    ///
    /// Each category with at least one requested bit is replaced by the requested
    /// value; categories without requested bits keep their current value. The
    /// receiver is not modified, so a failed merge leaves nothing half-applied.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError::UnsupportedEncoding` carrying `requested` when it has
    /// bits outside the three categories, names more than one value in a category,
    /// or produces an unsupported combination.
    pub fn merge(&self, requested: u32) -> Result<Self, EncodingError> {
        let unsupported = |reason: &str| EncodingError::UnsupportedEncoding {
            requested,
            reason: reason.to_string(),
        };
        check_unknown_bits(requested)?;

        let mut merged = *self;
        if requested & ROW_RETURN_MASK != 0 {
            merged.row = RowEncoding::from_bits(requested & ROW_RETURN_MASK)
                .ok_or_else(|| unsupported("row category must hold exactly one value"))?;
        }
        if requested & DATETIME_RETURN_MASK != 0 {
            merged.datetime = DatetimeEncoding::from_bits(requested & DATETIME_RETURN_MASK)
                .ok_or_else(|| unsupported("datetime category must hold exactly one value"))?;
        }
        if requested & DECIMAL_RETURN_MASK != 0 {
            merged.decimal = DecimalEncoding::from_bits(requested & DECIMAL_RETURN_MASK)
                .ok_or_else(|| unsupported("decimal category must hold exactly one value"))?;
        }

        merged.validate(requested)?;
        Ok(merged)
    }

    /// Checks combinations across categories.
    fn validate(&self, requested: u32) -> Result<(), EncodingError> {
        // Raw rows are handed through as received, nothing gets converted.
        if self.row == RowEncoding::Raw
            && (self.datetime != DatetimeEncoding::String
                || self.decimal != DecimalEncoding::String)
        {
            return Err(EncodingError::UnsupportedEncoding {
                requested,
                reason: "raw rows require datetime and decimal values as strings".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for EncodingSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06x}", self.bits())
    }
}

fn check_unknown_bits(bits: u32) -> Result<(), EncodingError> {
    let unknown = bits & !(ROW_RETURN_MASK | DATETIME_RETURN_MASK | DECIMAL_RETURN_MASK);
    if unknown != 0 {
        return Err(EncodingError::UnsupportedEncoding {
            requested: bits,
            reason: format!("bits 0x{unknown:08x} are outside every category"),
        });
    }
    Ok(())
}
