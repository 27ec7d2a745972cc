//! In-memory transport for testing.
//!
//! Every handle replays the same script: a column list, a sequence of buffers and
//! optional failures injected at open, handshake or buffer retrieval. What the
//! session sends through each handle is recorded in a shared [`MemoryLog`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;

use super::{ExportHandle, ExportTransport, TransportError, TransportResult};
use crate::attributes::{AttributeKey, AttributeValue};
use crate::encoding::RowEncoder;
use crate::types::Columns;

#[derive(Debug, Clone, Default)]
struct Script {
    columns: Columns,
    buffers: Vec<Bytes>,
    open_error: Option<TransportError>,
    unavailable_handshakes: usize,
    handshake_error: Option<TransportError>,
    columns_error: Option<TransportError>,
    /// Buffer index -> number of `Unavailable` failures before it is delivered.
    transient_buffer_failures: HashMap<usize, usize>,
    buffer_error: Option<(usize, TransportError)>,
}

/// Everything the handles of a [`MemoryTransport`] observed.
#[derive(Debug, Default)]
pub struct MemoryLog {
    opened: AtomicUsize,
    terminated: AtomicUsize,
    handshakes: AtomicUsize,
    buffer_requests: AtomicUsize,
    recorded: Mutex<Recorded>,
}

#[derive(Debug, Default)]
struct Recorded {
    hosts: Vec<String>,
    attributes: Vec<(AttributeKey, AttributeValue)>,
    query: Option<String>,
    encoder: Option<RowEncoder>,
}

impl MemoryLog {
    /// Handles allocated so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Handles terminated so far.
    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Handshake attempts, successful or not.
    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    /// `get_buffer` calls, successful or not.
    pub fn buffer_requests(&self) -> usize {
        self.buffer_requests.load(Ordering::SeqCst)
    }

    /// Hosts passed to `open`, in order.
    pub fn hosts(&self) -> Vec<String> {
        self.recorded().hosts.clone()
    }

    /// Attributes set on the most recent handle, in the order they were sent.
    pub fn attributes(&self) -> Vec<(AttributeKey, AttributeValue)> {
        self.recorded().attributes.clone()
    }

    /// Value sent for `key`, if any.
    pub fn attribute(&self, key: &AttributeKey) -> Option<AttributeValue> {
        self.recorded()
            .attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn query(&self) -> Option<String> {
        self.recorded().query.clone()
    }

    pub fn encoder(&self) -> Option<RowEncoder> {
        self.recorded().encoder.clone()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Scripted in-memory transport.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    script: Script,
    log: Arc<MemoryLog>,
}

impl MemoryTransport {
    /// Creates a transport whose streams report `columns` and yield `buffers`.
    pub fn new(columns: Columns, buffers: Vec<Bytes>) -> Self {
        Self {
            script: Script {
                columns,
                buffers,
                ..Script::default()
            },
            log: Arc::new(MemoryLog::default()),
        }
    }

    /// Fail handle allocation with `err`.
    #[must_use]
    pub fn with_open_error(mut self, err: TransportError) -> Self {
        self.script.open_error = Some(err);
        self
    }

    /// Report `Unavailable` for the first `count` handshake attempts of each handle.
    #[must_use]
    pub fn with_unavailable_handshakes(mut self, count: usize) -> Self {
        self.script.unavailable_handshakes = count;
        self
    }

    /// Fail every handshake (after any unavailable ones) with `err`.
    #[must_use]
    pub fn with_handshake_error(mut self, err: TransportError) -> Self {
        self.script.handshake_error = Some(err);
        self
    }

    /// Fail column retrieval with `err`.
    #[must_use]
    pub fn with_columns_error(mut self, err: TransportError) -> Self {
        self.script.columns_error = Some(err);
        self
    }

    /// Report `Unavailable` `count` times before delivering buffer `index`.
    #[must_use]
    pub fn with_transient_buffer_failures(mut self, index: usize, count: usize) -> Self {
        self.script.transient_buffer_failures.insert(index, count);
        self
    }

    /// Fail retrieval of buffer `index` with `err`.
    #[must_use]
    pub fn with_buffer_error(mut self, index: usize, err: TransportError) -> Self {
        self.script.buffer_error = Some((index, err));
        self
    }

    /// Shared log of what the handles observed.
    pub fn log(&self) -> Arc<MemoryLog> {
        Arc::clone(&self.log)
    }
}

impl ExportTransport for MemoryTransport {
    fn open(&self, host: &str) -> TransportResult<Box<dyn ExportHandle>> {
        if let Some(err) = &self.script.open_error {
            return Err(err.clone());
        }
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        {
            let mut recorded = self.log.recorded();
            recorded.hosts.push(host.to_string());
            recorded.attributes.clear();
            recorded.query = None;
            recorded.encoder = None;
        }
        Ok(Box::new(MemoryHandle {
            script: self.script.clone(),
            log: Arc::clone(&self.log),
            handshakes: 0,
            next_buffer: 0,
            open: false,
            terminated: false,
        }))
    }
}

struct MemoryHandle {
    script: Script,
    log: Arc<MemoryLog>,
    handshakes: usize,
    next_buffer: usize,
    open: bool,
    terminated: bool,
}

impl MemoryHandle {
    fn ensure_configurable(&self) -> TransportResult<()> {
        if self.terminated {
            return Err(TransportError::Protocol("handle terminated".to_string()));
        }
        if self.open {
            return Err(TransportError::Protocol(
                "handle already opened".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.terminated {
            return Err(TransportError::Protocol("handle terminated".to_string()));
        }
        if !self.open {
            return Err(TransportError::Protocol("handle not opened".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ExportHandle for MemoryHandle {
    fn set_attribute(
        &mut self,
        key: &AttributeKey,
        value: &AttributeValue,
    ) -> TransportResult<()> {
        self.ensure_configurable()?;
        let mut recorded = self.log.recorded();
        match recorded.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => recorded.attributes.push((*key, value.clone())),
        }
        Ok(())
    }

    fn set_query(&mut self, sql: &str) -> TransportResult<()> {
        self.ensure_configurable()?;
        self.log.recorded().query = Some(sql.to_string());
        Ok(())
    }

    fn set_encoder(&mut self, encoder: &RowEncoder) -> TransportResult<()> {
        self.ensure_configurable()?;
        self.log.recorded().encoder = Some(encoder.clone());
        Ok(())
    }

    async fn handshake(&mut self) -> TransportResult<()> {
        self.ensure_configurable()?;
        self.log.handshakes.fetch_add(1, Ordering::SeqCst);
        self.handshakes += 1;
        if self.handshakes <= self.script.unavailable_handshakes {
            return Err(TransportError::Unavailable(format!(
                "session limit reached (attempt {})",
                self.handshakes
            )));
        }
        if let Some(err) = &self.script.handshake_error {
            return Err(err.clone());
        }
        self.open = true;
        Ok(())
    }

    async fn columns(&mut self) -> TransportResult<Columns> {
        self.ensure_open()?;
        if let Some(err) = &self.script.columns_error {
            return Err(err.clone());
        }
        Ok(self.script.columns.clone())
    }

    async fn get_buffer(&mut self) -> TransportResult<Option<Bytes>> {
        self.ensure_open()?;
        self.log.buffer_requests.fetch_add(1, Ordering::SeqCst);
        let index = self.next_buffer;

        if let Some(remaining) = self.script.transient_buffer_failures.get_mut(&index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Unavailable(format!(
                    "buffer {index} not ready"
                )));
            }
        }
        if let Some((failing, err)) = &self.script.buffer_error {
            if *failing == index {
                return Err(err.clone());
            }
        }

        match self.script.buffers.get(index) {
            Some(buffer) => {
                self.next_buffer += 1;
                Ok(Some(buffer.clone()))
            }
            None => Ok(None),
        }
    }

    fn terminate(&mut self) -> TransportResult<()> {
        if self.terminated {
            return Err(TransportError::Protocol(
                "handle already terminated".to_string(),
            ));
        }
        self.terminated = true;
        self.open = false;
        self.log.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
