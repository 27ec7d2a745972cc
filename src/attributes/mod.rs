//! Session attributes.
//!
//! Attributes are the named settings handed to the transport before the stream
//! opens. Each key accepts exactly one value kind; the store keeps them in the
//! order they were first set.

mod key;
mod store;

pub use key::{
    AttributeKey, AttributeValue, ValueKind, MAX_TENACITY_HOURS, MAX_TENACITY_SLEEP,
};
pub use store::{
    AttributeStore, SessionDefaults, DEFAULT_BLOCK_SIZE, DEFAULT_CHARSET, EXPORT_OPERATOR,
    NO_SPOOL, ROW_MAX_SIZE,
};
