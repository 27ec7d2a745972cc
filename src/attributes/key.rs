//! Attribute keys and their typed values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Longest tenacity window the server accepts, in hours.
pub const MAX_TENACITY_HOURS: i64 = 120;

/// Longest pause between queued logon attempts, in seconds.
pub const MAX_TENACITY_SLEEP: i64 = 3_600;

/// The kind of value an attribute key accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Integer,
    String,
    Boolean,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Boolean => write!(f, "boolean"),
        }
    }
}

/// Supported session attributes exchanged with the transport before stream start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeKey {
    /// Role the transport operator plays (always `EXPORT`).
    SystemOperator,
    /// Host identifier of the warehouse.
    TdpId,
    UserName,
    UserPassword,
    MinSessions,
    MaxSessions,
    MaxDecimalDigits,
    Charset,
    BufferMode,
    BlockSize,
    BufferHeaderSize,
    BufferLengthSize,
    BufferMaxSize,
    BufferTrailerSize,
    /// Preferred spool mode. A hint: the server may still spool results.
    SpoolMode,
    /// Hours the server keeps retrying a queued logon before giving up.
    TenacityHours,
    /// Seconds between logon retries.
    TenacitySleep,
    /// Session-level query band identifying the client utility.
    QueryBandSessInfo,
    /// Vendor attribute addressed by its numeric identifier. Always an integer.
    Custom(u32),
}

impl AttributeKey {
    /// All named keys, in the order defaults are applied.
    pub const NAMED: [AttributeKey; 18] = [
        AttributeKey::SystemOperator,
        AttributeKey::TdpId,
        AttributeKey::UserName,
        AttributeKey::UserPassword,
        AttributeKey::MinSessions,
        AttributeKey::MaxSessions,
        AttributeKey::MaxDecimalDigits,
        AttributeKey::Charset,
        AttributeKey::BufferMode,
        AttributeKey::BlockSize,
        AttributeKey::BufferHeaderSize,
        AttributeKey::BufferLengthSize,
        AttributeKey::BufferMaxSize,
        AttributeKey::BufferTrailerSize,
        AttributeKey::SpoolMode,
        AttributeKey::TenacityHours,
        AttributeKey::TenacitySleep,
        AttributeKey::QueryBandSessInfo,
    ];

    /// The value kind this key accepts.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            AttributeKey::SystemOperator
            | AttributeKey::TdpId
            | AttributeKey::UserName
            | AttributeKey::UserPassword
            | AttributeKey::Charset
            | AttributeKey::SpoolMode
            | AttributeKey::QueryBandSessInfo => ValueKind::String,
            AttributeKey::BufferMode => ValueKind::Boolean,
            AttributeKey::MinSessions
            | AttributeKey::MaxSessions
            | AttributeKey::MaxDecimalDigits
            | AttributeKey::BlockSize
            | AttributeKey::BufferHeaderSize
            | AttributeKey::BufferLengthSize
            | AttributeKey::BufferMaxSize
            | AttributeKey::BufferTrailerSize
            | AttributeKey::TenacityHours
            | AttributeKey::TenacitySleep
            | AttributeKey::Custom(_) => ValueKind::Integer,
        }
    }

    /// Keys derived from the session credentials. They are set once at construction.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            AttributeKey::SystemOperator
                | AttributeKey::TdpId
                | AttributeKey::UserName
                | AttributeKey::UserPassword
        )
    }

    /// Keys whose values must never appear in logs.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self, AttributeKey::UserPassword)
    }

    /// Inclusive lower bound for integer keys, if any.
    #[must_use]
    pub fn min_value(&self) -> Option<i64> {
        match self {
            AttributeKey::MinSessions
            | AttributeKey::MaxSessions
            | AttributeKey::MaxDecimalDigits
            | AttributeKey::BlockSize
            | AttributeKey::BufferMaxSize
            | AttributeKey::TenacityHours
            | AttributeKey::TenacitySleep => Some(1),
            AttributeKey::BufferHeaderSize
            | AttributeKey::BufferLengthSize
            | AttributeKey::BufferTrailerSize => Some(0),
            _ => None,
        }
    }

    /// Inclusive upper bound for integer keys, if any.
    #[must_use]
    pub fn max_value(&self) -> Option<i64> {
        match self {
            AttributeKey::MaxDecimalDigits => Some(38),
            AttributeKey::TenacityHours => Some(MAX_TENACITY_HOURS),
            AttributeKey::TenacitySleep => Some(MAX_TENACITY_SLEEP),
            _ => None,
        }
    }

    /// The canonical kebab-case name of the key.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            AttributeKey::SystemOperator => "system-operator".to_string(),
            AttributeKey::TdpId => "tdp-id".to_string(),
            AttributeKey::UserName => "user-name".to_string(),
            AttributeKey::UserPassword => "user-password".to_string(),
            AttributeKey::MinSessions => "min-sessions".to_string(),
            AttributeKey::MaxSessions => "max-sessions".to_string(),
            AttributeKey::MaxDecimalDigits => "max-decimal-digits".to_string(),
            AttributeKey::Charset => "charset".to_string(),
            AttributeKey::BufferMode => "buffer-mode".to_string(),
            AttributeKey::BlockSize => "block-size".to_string(),
            AttributeKey::BufferHeaderSize => "buffer-header-size".to_string(),
            AttributeKey::BufferLengthSize => "buffer-length-size".to_string(),
            AttributeKey::BufferMaxSize => "buffer-max-size".to_string(),
            AttributeKey::BufferTrailerSize => "buffer-trailer-size".to_string(),
            AttributeKey::SpoolMode => "spool-mode".to_string(),
            AttributeKey::TenacityHours => "tenacity-hours".to_string(),
            AttributeKey::TenacitySleep => "tenacity-sleep".to_string(),
            AttributeKey::QueryBandSessInfo => "query-band".to_string(),
            AttributeKey::Custom(id) => format!("custom:{id}"),
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for AttributeKey {
    type Err = ConfigurationError;

    /// Parses a key name as supplied by an embedding caller.
    ///
    /// Names are matched case-insensitively and `_` is accepted in place of `-`.
    /// Vendor attributes are addressed as `custom:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");

        if let Some(id) = normalized.strip_prefix("custom:") {
            return id
                .parse::<u32>()
                .map(AttributeKey::Custom)
                .map_err(|_| ConfigurationError::UnknownKey(s.to_string()));
        }

        AttributeKey::NAMED
            .iter()
            .find(|key| key.name() == normalized)
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownKey(s.to_string()))
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    String(String),
    Boolean(bool),
}

impl AttributeValue {
    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            AttributeValue::Integer(_) => ValueKind::Integer,
            AttributeValue::String(_) => ValueKind::String,
            AttributeValue::Boolean(_) => ValueKind::Boolean,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Integer(v) => write!(f, "{v}"),
            AttributeValue::String(v) => write!(f, "{v}"),
            // The transport spells booleans as YES/NO.
            AttributeValue::Boolean(true) => write!(f, "YES"),
            AttributeValue::Boolean(false) => write!(f, "NO"),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(i64::from(v))
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        AttributeValue::Integer(i64::from(v))
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_kinds() {
        assert_eq!(AttributeKey::MaxSessions.kind(), ValueKind::Integer);
        assert_eq!(AttributeKey::Charset.kind(), ValueKind::String);
        assert_eq!(AttributeKey::BufferMode.kind(), ValueKind::Boolean);
        assert_eq!(AttributeKey::Custom(42).kind(), ValueKind::Integer);
    }

    #[test]
    fn test_key_from_str() {
        assert_eq!(
            "max-sessions".parse::<AttributeKey>().unwrap(),
            AttributeKey::MaxSessions
        );
        assert_eq!(
            "TENACITY_SLEEP".parse::<AttributeKey>().unwrap(),
            AttributeKey::TenacitySleep
        );
        assert_eq!(
            "custom:1027".parse::<AttributeKey>().unwrap(),
            AttributeKey::Custom(1027)
        );
    }

    #[test]
    fn test_key_from_str_unknown() {
        let err = "max-widgets".parse::<AttributeKey>().unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownKey("max-widgets".to_string()));

        assert!("custom:abc".parse::<AttributeKey>().is_err());
    }

    #[test]
    fn test_tenacity_bounds() {
        assert_eq!(AttributeKey::TenacityHours.min_value(), Some(1));
        assert_eq!(AttributeKey::TenacityHours.max_value(), Some(120));
        assert_eq!(AttributeKey::TenacitySleep.max_value(), Some(3_600));
        assert_eq!(AttributeKey::MaxSessions.max_value(), None);
    }

    #[test]
    fn test_key_name_roundtrips_for_every_named_key() {
        for key in AttributeKey::NAMED {
            assert_eq!(key.name().parse::<AttributeKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_reserved_keys() {
        assert!(AttributeKey::UserPassword.is_reserved());
        assert!(AttributeKey::TdpId.is_reserved());
        assert!(!AttributeKey::MaxSessions.is_reserved());
        assert!(AttributeKey::UserPassword.is_secret());
        assert!(!AttributeKey::UserName.is_secret());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(AttributeValue::from(5).kind(), ValueKind::Integer);
        assert_eq!(AttributeValue::from("UTF8").as_str(), Some("UTF8"));
        assert_eq!(AttributeValue::from(true).as_bool(), Some(true));
        assert_eq!(AttributeValue::from("x").as_integer(), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(AttributeValue::from(38).to_string(), "38");
        assert_eq!(AttributeValue::from(true).to_string(), "YES");
        assert_eq!(AttributeValue::from(false).to_string(), "NO");
    }

    #[test]
    fn test_value_deserialize_untagged() {
        let v: AttributeValue = serde_json::from_str("10").unwrap();
        assert_eq!(v, AttributeValue::Integer(10));
        let v: AttributeValue = serde_json::from_str("\"NoSpool\"").unwrap();
        assert_eq!(v, AttributeValue::String("NoSpool".to_string()));
        let v: AttributeValue = serde_json::from_str("false").unwrap();
        assert_eq!(v, AttributeValue::Boolean(false));
    }
}
