//! Vendor transport abstraction.
//!
//! A session talks to the parallel-transport driver through two traits:
//!
//! - `ExportTransport`: allocates native handles
//! - `ExportHandle`: one allocated handle, configured, opened and drained by a
//!   single session
//!
//! `MemoryTransport` is a scripted in-memory implementation for tests and for
//! embedding programs that want to exercise the session without a database.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tpt_export::{ExportSession, MemoryTransport};
//!
//! let transport = Arc::new(MemoryTransport::new(columns, buffers));
//! let mut session = ExportSession::new(transport, "dbc", "user", "pass");
//! ```

mod memory;

pub use memory::{MemoryLog, MemoryTransport};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::attributes::{AttributeKey, AttributeValue};
use crate::encoding::RowEncoder;
use crate::types::Columns;

/// Errors reported by the vendor transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The remote side cannot accept the request right now; retrying may succeed.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The remote side refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The handle was used out of order or returned malformed data.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(String),
}

impl TransportError {
    /// Whether the failure is transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Unavailable(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Factory for native export handles.
pub trait ExportTransport: Send + Sync {
    /// Allocates a handle for `host`. Nothing is sent to the host yet.
    fn open(&self, host: &str) -> TransportResult<Box<dyn ExportHandle>>;
}

/// A native export handle.
///
/// Configuration calls happen before `handshake`; `columns` and `get_buffer` are
/// only meaningful after a successful handshake. `terminate` is synchronous so it
/// can run from `Drop`.
#[async_trait]
pub trait ExportHandle: Send {
    fn set_attribute(&mut self, key: &AttributeKey, value: &AttributeValue)
        -> TransportResult<()>;

    fn set_query(&mut self, sql: &str) -> TransportResult<()>;

    fn set_encoder(&mut self, encoder: &RowEncoder) -> TransportResult<()>;

    /// Opens the export stream.
    async fn handshake(&mut self) -> TransportResult<()>;

    /// Column metadata of the open stream.
    async fn columns(&mut self) -> TransportResult<Columns>;

    /// Next buffer of the stream, or `None` once the stream is drained.
    async fn get_buffer(&mut self) -> TransportResult<Option<Bytes>>;

    /// Releases the native handle.
    fn terminate(&mut self) -> TransportResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::Unavailable("busy".into()).is_retryable());
        assert!(!TransportError::Rejected("bad password".into()).is_retryable());
        assert!(!TransportError::Protocol("out of order".into()).is_retryable());
        assert!(!TransportError::Io("reset".into()).is_retryable());
    }

    #[test]
    fn test_from_io_error() {
        let err: TransportError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert_eq!(err, TransportError::Io("pipe closed".to_string()));
    }
}
