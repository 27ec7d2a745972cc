//! Encoding settings and encoder overrides.
//!
//! [`EncodingSettings`] describes how rows, datetimes and decimals come back from
//! the transport. [`RowEncoder`] bundles those settings with the null marker and
//! field delimiter used for text rows.

mod encoder;
mod settings;

pub use encoder::{OverrideValue, RowEncoder, DEFAULT_DELIMITER, DEFAULT_NULL};
pub use settings::{
    DatetimeEncoding, DecimalEncoding, EncodingSettings, RowEncoding, ARCHIVE,
    DATETIME_AS_NATIVE, DATETIME_AS_STRING, DATETIME_RETURN_MASK, DECIMAL_AS_FLOAT,
    DECIMAL_AS_NATIVE, DECIMAL_AS_STRING, DECIMAL_RETURN_MASK, ITEMS, ROW_ENCODING_DICT,
    ROW_ENCODING_LIST, ROW_ENCODING_RAW, ROW_ENCODING_STRING, ROW_RETURN_MASK, STRINGS, VALUES,
};
