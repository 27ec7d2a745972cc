//! Session states and ownership of the native handle.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::transport::ExportHandle;

/// Lifecycle state of an [`ExportSession`](super::ExportSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Constructed with defaults; nothing changed yet.
    Created,
    /// At least one attribute, the query or the encoder was changed.
    Configured,
    /// The transport session is open and buffers can be read.
    Active,
    /// Closed. Terminal.
    Terminated,
}

impl SessionState {
    /// Whether attributes, query and encoder may still change.
    #[must_use]
    pub fn is_configurable(self) -> bool {
        matches!(self, SessionState::Created | SessionState::Configured)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "Created",
            SessionState::Configured => "Configured",
            SessionState::Active => "Active",
            SessionState::Terminated => "Terminated",
        };
        f.write_str(name)
    }
}

/// One step of an export stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// A non-empty buffer of encoded rows.
    Buffer(Bytes),
    /// The stream is drained.
    EndOfStream,
}

impl Chunk {
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Chunk::EndOfStream)
    }

    #[must_use]
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Chunk::Buffer(bytes) => Some(bytes),
            Chunk::EndOfStream => None,
        }
    }
}

/// Sole owner of an allocated native handle.
///
/// The handle is terminated exactly once: by [`release`](Self::release) or, if
/// that never happens, when the guard is dropped.
pub struct HandleGuard {
    host: String,
    handle: Option<Box<dyn ExportHandle>>,
}

impl HandleGuard {
    pub fn new(host: impl Into<String>, handle: Box<dyn ExportHandle>) -> Self {
        Self {
            host: host.into(),
            handle: Some(handle),
        }
    }

    /// The guarded handle, unless already released.
    pub fn handle_mut(&mut self) -> Option<&mut (dyn ExportHandle + 'static)> {
        self.handle.as_deref_mut()
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Terminates the handle. Returns `false` if it was already released.
    ///
    /// Termination failures are logged, not returned.
    pub fn release(&mut self) -> bool {
        let Some(mut handle) = self.handle.take() else {
            return false;
        };
        match handle.terminate() {
            Ok(()) => debug!(host = %self.host, "transport handle terminated"),
            Err(err) => warn!(host = %self.host, error = %err, "failed to terminate transport handle"),
        }
        true
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for HandleGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleGuard")
            .field("host", &self.host)
            .field("released", &self.is_released())
            .finish()
    }
}
