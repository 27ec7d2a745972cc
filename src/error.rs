//! Error types for export sessions.
//!
//! Every category of failure has its own enum so callers can match on exactly the
//! class of problem they care about. [`ExportError`] wraps all of them for the
//! session-level API.

use thiserror::Error;

use crate::attributes::{AttributeKey, ValueKind};
use crate::session::SessionState;
use crate::transport::TransportError;

/// Top-level error type returned by [`ExportSession`](crate::ExportSession) operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Invalid attribute or query configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Unsupported encoding settings or override value.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Operation invoked in the wrong session state.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The transport session could not be established.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Failure while reading from an open stream.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// I/O error in one of the export helpers.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Returns the session state carried by a lifecycle error, if any.
    #[must_use]
    pub fn lifecycle_state(&self) -> Option<SessionState> {
        match self {
            ExportError::Lifecycle(err) => err.state(),
            _ => None,
        }
    }
}

/// Attribute and query configuration errors. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The attribute name is not one of the supported keys.
    #[error("Unknown attribute key '{0}'")]
    UnknownKey(String),

    /// The value kind does not match what the key expects.
    #[error("Attribute {key} expects a {expected} value, got {actual}")]
    KindMismatch {
        key: AttributeKey,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// The attribute is derived from the session credentials and cannot be overridden.
    #[error("Attribute {0} is reserved and cannot be overridden")]
    Reserved(AttributeKey),

    /// The attribute value is outside the accepted range.
    #[error("Attribute {key} value {value} is out of range: {message}")]
    OutOfRange {
        key: AttributeKey,
        value: i64,
        message: String,
    },

    /// The query text did not contain a statement.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Encoding bitmask and override errors. The stored settings are never partially updated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The merged bitmask does not describe a supported encoding.
    #[error("Encoder set_encoding failed, bad encoding '0x{requested:06x}': {reason}")]
    UnsupportedEncoding { requested: u32, reason: String },

    /// The null marker cannot be represented by the encoder.
    #[error("Invalid null marker: {0}")]
    InvalidNull(String),

    /// The field delimiter cannot be represented by the encoder.
    #[error("Invalid delimiter: {0}")]
    InvalidDelimiter(String),
}

/// Operation invoked in a state that does not allow it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The operation requires a different session state.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// `initiate` was called without a query.
    #[error("Must set target table or query before initiating")]
    MissingQuery,

    /// End of stream was already reported.
    #[error("Export stream is exhausted")]
    StreamExhausted,
}

impl LifecycleError {
    pub(crate) fn invalid(operation: &'static str, state: SessionState) -> Self {
        LifecycleError::InvalidState { operation, state }
    }

    /// The state the session was in when the error occurred, if recorded.
    #[must_use]
    pub fn state(&self) -> Option<SessionState> {
        match self {
            LifecycleError::InvalidState { state, .. } => Some(*state),
            _ => None,
        }
    }
}

/// Failure to open the transport session.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The handle could not be allocated or configured.
    #[error("Failed to set up transport session on {host}: {source}")]
    Setup {
        host: String,
        #[source]
        source: TransportError,
    },

    /// The remote side refused the handshake with a non-retryable error.
    #[error("Connection to {host} rejected: {source}")]
    Rejected {
        host: String,
        #[source]
        source: TransportError,
    },

    /// The remote side stayed unavailable for the whole tenacity window.
    #[error("Connection to {host} not accepted after {attempts} attempts within {hours}h: {last}")]
    TenacityExhausted {
        host: String,
        attempts: u32,
        hours: u32,
        last: TransportError,
    },

    /// The caller-provided deadline elapsed before the handshake completed.
    #[error("Initiate timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Failure while retrieving data or metadata from an open stream.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Column metadata could not be retrieved.
    #[error("Failed to retrieve columns: {0}")]
    Columns(#[source] TransportError),

    /// The transport reported a stream without columns.
    #[error("Transport reported no columns for the query")]
    EmptySchema,

    /// A buffer could not be retrieved.
    #[error("Failed to retrieve buffer {index}: {source}")]
    Buffer {
        index: u64,
        #[source]
        source: TransportError,
    },

    /// Transient unavailability persisted past the retry limit.
    #[error("Buffer {index} unavailable after {attempts} attempts: {last}")]
    RetriesExhausted {
        index: u64,
        attempts: u32,
        last: TransportError,
    },
}
