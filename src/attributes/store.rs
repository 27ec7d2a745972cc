//! Ordered attribute storage and production defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{AttributeKey, AttributeValue};
use crate::error::ConfigurationError;

/// Block size requested from the transport, in bytes.
pub const DEFAULT_BLOCK_SIZE: i64 = 64_330;

/// Largest row the transport may return, in bytes.
pub const ROW_MAX_SIZE: i64 = 64_260;

/// Character set preferring UTF-8 output.
pub const DEFAULT_CHARSET: &str = "UTF8";

/// Spool mode that asks the server to stream results without staging them.
pub const NO_SPOOL: &str = "NoSpool";

/// Operator role for export sessions.
pub const EXPORT_OPERATOR: &str = "EXPORT";

/// Default attribute values applied to every new session.
///
/// The value is immutable once built; each session copies it into its own
/// [`AttributeStore`] and overrides only touch that copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Minimum number of parallel transport sessions (default: 2).
    pub min_sessions: i64,
    /// Maximum number of parallel transport sessions (default: 5).
    ///
    /// Kept low so a single export cannot exhaust session slots on the server.
    pub max_sessions: i64,
    /// Maximum decimal digits returned (default: 38).
    pub max_decimal_digits: i64,
    /// Session character set (default: "UTF8").
    pub charset: String,
    /// Whether buffer mode is enabled (default: true).
    pub buffer_mode: bool,
    /// Buffer block size in bytes (default: 64330).
    pub block_size: i64,
    /// Size of each buffer header in bytes (default: 2).
    pub buffer_header_size: i64,
    /// Size of each row length field in bytes (default: 2).
    pub buffer_length_size: i64,
    /// Maximum row size in bytes (default: 64260).
    pub buffer_max_size: i64,
    /// Size of each buffer trailer in bytes (default: 0).
    pub buffer_trailer_size: i64,
    /// Preferred spool mode (default: "NoSpool").
    pub spool_mode: String,
    /// Tenacity window in hours (default: 1, the lowest the server accepts).
    ///
    /// A client that disappears without terminating is discarded by the server
    /// after at most this long.
    pub tenacity_hours: i64,
    /// Seconds between logon retries while queued (default: 1).
    pub tenacity_sleep: i64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self::production()
    }
}

impl SessionDefaults {
    /// Production-safe defaults.
    #[must_use]
    pub fn production() -> Self {
        Self {
            min_sessions: 2,
            max_sessions: 5,
            max_decimal_digits: 38,
            charset: DEFAULT_CHARSET.to_string(),
            buffer_mode: true,
            block_size: DEFAULT_BLOCK_SIZE,
            buffer_header_size: 2,
            buffer_length_size: 2,
            buffer_max_size: ROW_MAX_SIZE,
            buffer_trailer_size: 0,
            spool_mode: NO_SPOOL.to_string(),
            tenacity_hours: 1,
            tenacity_sleep: 1,
        }
    }

    /// Parses defaults from JSON. Missing fields keep their production value.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Applies the attribute kind and range checks to every default, then the
    /// cross-key checks.
    ///
    /// # Errors
    ///
    /// The first `ConfigurationError` found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut store = AttributeStore::new();
        for (key, value) in self.to_attributes() {
            AttributeStore::check(key, &value)?;
            store.put(key, value);
        }
        store.validate()
    }

    /// The defaults as ordered attribute pairs.
    #[must_use]
    pub fn to_attributes(&self) -> Vec<(AttributeKey, AttributeValue)> {
        vec![
            (AttributeKey::MinSessions, self.min_sessions.into()),
            (AttributeKey::MaxSessions, self.max_sessions.into()),
            (AttributeKey::MaxDecimalDigits, self.max_decimal_digits.into()),
            (AttributeKey::Charset, self.charset.clone().into()),
            (AttributeKey::BufferMode, self.buffer_mode.into()),
            (AttributeKey::BlockSize, self.block_size.into()),
            (AttributeKey::BufferHeaderSize, self.buffer_header_size.into()),
            (AttributeKey::BufferLengthSize, self.buffer_length_size.into()),
            (AttributeKey::BufferMaxSize, self.buffer_max_size.into()),
            (AttributeKey::BufferTrailerSize, self.buffer_trailer_size.into()),
            (AttributeKey::SpoolMode, self.spool_mode.clone().into()),
            (AttributeKey::TenacityHours, self.tenacity_hours.into()),
            (AttributeKey::TenacitySleep, self.tenacity_sleep.into()),
        ]
    }
}

/// Ordered mapping of attribute keys to values.
///
/// Keys keep the position of their first insertion; overriding a key replaces its
/// value in place. That is the order attributes are handed to the transport.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AttributeStore {
    entries: Vec<(AttributeKey, AttributeValue)>,
}

impl fmt::Debug for AttributeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.entries {
            if key.is_secret() {
                map.entry(&key.name(), &"<redacted>");
            } else {
                map.entry(&key.name(), value);
            }
        }
        map.finish()
    }
}

impl AttributeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the credential attributes followed by `defaults`.
    #[must_use]
    pub fn for_export(
        host: &str,
        username: &str,
        password: &str,
        defaults: &SessionDefaults,
    ) -> Self {
        let mut store = Self::new();
        store.put(AttributeKey::SystemOperator, EXPORT_OPERATOR.into());
        store.put(AttributeKey::TdpId, host.into());
        store.put(AttributeKey::UserName, username.into());
        store.put(AttributeKey::UserPassword, password.into());
        for (key, value) in defaults.to_attributes() {
            store.put(key, value);
        }
        store
    }

    /// Validates and stores an attribute supplied by the caller.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::Reserved` for credential keys
    /// - `ConfigurationError::KindMismatch` if the value kind is wrong for the key
    /// - `ConfigurationError::OutOfRange` if an integer is outside the key's bounds
    pub fn insert(
        &mut self,
        key: AttributeKey,
        value: AttributeValue,
    ) -> Result<Option<AttributeValue>, ConfigurationError> {
        if key.is_reserved() {
            return Err(ConfigurationError::Reserved(key));
        }
        Self::check(key, &value)?;
        Ok(self.put(key, value))
    }

    /// Checks the kind and range of a value for `key`.
    pub fn check(key: AttributeKey, value: &AttributeValue) -> Result<(), ConfigurationError> {
        if value.kind() != key.kind() {
            return Err(ConfigurationError::KindMismatch {
                key,
                expected: key.kind(),
                actual: value.kind(),
            });
        }

        if let Some(v) = value.as_integer() {
            if let Some(min) = key.min_value() {
                if v < min {
                    return Err(ConfigurationError::OutOfRange {
                        key,
                        value: v,
                        message: format!("must be at least {min}"),
                    });
                }
            }
            if let Some(max) = key.max_value() {
                if v > max {
                    return Err(ConfigurationError::OutOfRange {
                        key,
                        value: v,
                        message: format!("must be at most {max}"),
                    });
                }
            }
        }

        Ok(())
    }

    /// Stores a value without validation, returning the previous one.
    pub(crate) fn put(
        &mut self,
        key: AttributeKey,
        value: AttributeValue,
    ) -> Option<AttributeValue> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Checks constraints spanning several attributes.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let (Some(min), Some(max)) = (
            self.get_integer(AttributeKey::MinSessions),
            self.get_integer(AttributeKey::MaxSessions),
        ) {
            if min > max {
                return Err(ConfigurationError::OutOfRange {
                    key: AttributeKey::MinSessions,
                    value: min,
                    message: format!("exceeds max-sessions {max}"),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn get_integer(&self, key: AttributeKey) -> Option<i64> {
        self.get(key).and_then(AttributeValue::as_integer)
    }

    #[must_use]
    pub fn get_str(&self, key: AttributeKey) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: AttributeKey) -> bool {
        self.get(key).is_some()
    }

    /// Iterates attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&AttributeKey, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::ValueKind;

    fn export_store() -> AttributeStore {
        AttributeStore::for_export("dbc", "user", "secret", &SessionDefaults::production())
    }

    #[test]
    fn test_production_defaults() {
        let d = SessionDefaults::production();
        assert_eq!(d.min_sessions, 2);
        assert_eq!(d.max_sessions, 5);
        assert_eq!(d.max_decimal_digits, 38);
        assert_eq!(d.charset, "UTF8");
        assert!(d.buffer_mode);
        assert_eq!(d.block_size, 64_330);
        assert_eq!(d.buffer_header_size, 2);
        assert_eq!(d.buffer_length_size, 2);
        assert_eq!(d.buffer_trailer_size, 0);
        assert_eq!(d.buffer_max_size, ROW_MAX_SIZE);
        assert_eq!(d.spool_mode, "NoSpool");
        assert_eq!(d.tenacity_hours, 1);
        assert_eq!(d.tenacity_sleep, 1);
        assert_eq!(SessionDefaults::default(), d);
    }

    #[test]
    fn test_defaults_validate() {
        assert!(SessionDefaults::production().validate().is_ok());

        let digits = SessionDefaults {
            max_decimal_digits: 99,
            ..SessionDefaults::production()
        };
        assert!(matches!(
            digits.validate(),
            Err(ConfigurationError::OutOfRange {
                key: AttributeKey::MaxDecimalDigits,
                value: 99,
                ..
            })
        ));

        let block = SessionDefaults {
            block_size: -7,
            ..SessionDefaults::production()
        };
        assert!(block.validate().is_err());

        let sessions = SessionDefaults {
            min_sessions: 6,
            ..SessionDefaults::production()
        };
        assert!(matches!(
            sessions.validate(),
            Err(ConfigurationError::OutOfRange {
                key: AttributeKey::MinSessions,
                ..
            })
        ));
    }

    #[test]
    fn test_defaults_from_partial_json() {
        let d = SessionDefaults::from_json(r#"{"max_sessions": 8, "spool_mode": "Spool"}"#)
            .unwrap();
        assert_eq!(d.max_sessions, 8);
        assert_eq!(d.spool_mode, "Spool");
        assert_eq!(d.min_sessions, 2);
        assert_eq!(d.tenacity_hours, 1);
    }

    #[test]
    fn test_for_export_order() {
        let store = export_store();
        let keys: Vec<AttributeKey> = store.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys[0], AttributeKey::SystemOperator);
        assert_eq!(keys[1], AttributeKey::TdpId);
        assert_eq!(keys[2], AttributeKey::UserName);
        assert_eq!(keys[3], AttributeKey::UserPassword);
        assert_eq!(keys[4], AttributeKey::MinSessions);
        assert_eq!(*keys.last().unwrap(), AttributeKey::TenacitySleep);
        assert_eq!(store.len(), 17);
        assert_eq!(store.get_str(AttributeKey::SystemOperator), Some("EXPORT"));
        assert_eq!(store.get_str(AttributeKey::TdpId), Some("dbc"));
    }

    #[test]
    fn test_insert_overrides_in_place() {
        let mut store = export_store();
        let before: Vec<AttributeKey> = store.iter().map(|(k, _)| *k).collect();

        let previous = store
            .insert(AttributeKey::MaxSessions, AttributeValue::from(10))
            .unwrap();

        assert_eq!(previous, Some(AttributeValue::Integer(5)));
        assert_eq!(store.get_integer(AttributeKey::MaxSessions), Some(10));
        let after: Vec<AttributeKey> = store.iter().map(|(k, _)| *k).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_insert_new_key_appends() {
        let mut store = export_store();
        store
            .insert(AttributeKey::Custom(9), AttributeValue::from(1))
            .unwrap();
        let (last, value) = store.iter().last().unwrap();
        assert_eq!(*last, AttributeKey::Custom(9));
        assert_eq!(value, &AttributeValue::Integer(1));
    }

    #[test]
    fn test_insert_kind_mismatch() {
        let mut store = export_store();
        let err = store
            .insert(AttributeKey::MaxSessions, AttributeValue::from("ten"))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::KindMismatch {
                key: AttributeKey::MaxSessions,
                expected: ValueKind::Integer,
                actual: ValueKind::String,
            }
        );
        assert_eq!(store.get_integer(AttributeKey::MaxSessions), Some(5));
    }

    #[test]
    fn test_insert_reserved() {
        let mut store = export_store();
        let err = store
            .insert(AttributeKey::UserPassword, AttributeValue::from("other"))
            .unwrap_err();
        assert_eq!(err, ConfigurationError::Reserved(AttributeKey::UserPassword));
        assert_eq!(store.get_str(AttributeKey::UserPassword), Some("secret"));
    }

    #[test]
    fn test_insert_out_of_range() {
        let mut store = export_store();
        assert!(matches!(
            store.insert(AttributeKey::TenacitySleep, AttributeValue::from(0)),
            Err(ConfigurationError::OutOfRange { .. })
        ));
        assert!(matches!(
            store.insert(AttributeKey::MaxDecimalDigits, AttributeValue::from(39)),
            Err(ConfigurationError::OutOfRange { .. })
        ));
        assert!(store
            .insert(AttributeKey::BufferTrailerSize, AttributeValue::from(0))
            .is_ok());
    }

    #[test]
    fn test_validate_session_bounds() {
        let mut store = export_store();
        assert!(store.validate().is_ok());

        store
            .insert(AttributeKey::MinSessions, AttributeValue::from(8))
            .unwrap();
        let err = store.validate().unwrap_err();
        assert!(err.to_string().contains("max-sessions 5"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let store = export_store();
        let debug = format!("{store:?}");
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("max-sessions"));
        assert!(!debug.contains("\"secret\""));
    }
}
