//! The export session controller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::lifecycle::{Chunk, HandleGuard, SessionState};
use super::options::SessionOptions;
use super::tenacity::TenacityPolicy;
use crate::attributes::{AttributeKey, AttributeStore, AttributeValue, SessionDefaults};
use crate::encoding::{EncodingSettings, OverrideValue, RowEncoder};
use crate::error::{ConnectionError, ExportError, LifecycleError, ProtocolError};
use crate::query::normalize_query;
use crate::transport::{ExportHandle, ExportTransport};
use crate::types::Columns;

/// Name reported in the query band.
pub const UTILITY_NAME: &str = "tpt-export";

/// Query band identifying this client to the server.
#[must_use]
pub fn query_band() -> String {
    format!(
        "UTILITYNAME={UTILITY_NAME};VERSION={};",
        env!("CARGO_PKG_VERSION")
    )
}

/// Client-side controller for one export job.
///
/// A session moves through `Created -> Configured -> Active -> Terminated`.
/// Attributes, query and encoder can only change before [`initiate`](Self::initiate);
/// buffers and columns can only be read after it. [`close`](Self::close) releases
/// the native handle and is safe to call in any state, any number of times.
///
/// # Example
///
/// ```ignore
/// let mut session = ExportSession::new(transport, "dbc", "user", "pass");
/// session.set_query("select * from dbc.dbcinfo")?;
/// session.initiate().await?;
/// while let Chunk::Buffer(bytes) = session.next().await? {
///     out.write_all(&bytes).await?;
/// }
/// session.close();
/// ```
pub struct ExportSession {
    transport: Arc<dyn ExportTransport>,
    host: String,
    username: String,
    attributes: AttributeStore,
    query: Option<String>,
    encoder: RowEncoder,
    buffer_retry_limit: u32,
    state: SessionState,
    tenacity: TenacityPolicy,
    guard: Option<HandleGuard>,
    columns: Option<Columns>,
    buffers_read: u64,
    bytes_read: u64,
    exhausted: bool,
}

impl ExportSession {
    /// Creates a session with production defaults.
    pub fn new(
        transport: Arc<dyn ExportTransport>,
        host: &str,
        username: &str,
        password: &str,
    ) -> Self {
        Self::with_defaults(
            transport,
            host,
            username,
            password,
            &SessionDefaults::production(),
            super::options::DEFAULT_BUFFER_RETRY_LIMIT,
        )
    }

    /// Creates a session and applies `options` to it.
    ///
    /// # Errors
    ///
    /// Returns the first configuration or encoding error raised by the options,
    /// including defaults outside the range the attribute keys accept.
    pub fn with_options(
        transport: Arc<dyn ExportTransport>,
        host: &str,
        username: &str,
        password: &str,
        options: SessionOptions,
    ) -> Result<Self, ExportError> {
        options.defaults.validate()?;
        let mut session = Self::with_defaults(
            transport,
            host,
            username,
            password,
            &options.defaults,
            options.buffer_retry_limit,
        );

        for (name, value) in options.attributes {
            session.add_named_attribute(&name, value)?;
        }
        if let Some(encoding) = options.encoding {
            session.set_encoding(encoding)?;
        }
        if options.null.is_some() || options.delimiter.is_some() {
            session
                .encoder
                .set_overrides(options.null, options.delimiter.map(OverrideValue::from))?;
            session.mark_configured();
        }

        Ok(session)
    }

    fn with_defaults(
        transport: Arc<dyn ExportTransport>,
        host: &str,
        username: &str,
        password: &str,
        defaults: &SessionDefaults,
        buffer_retry_limit: u32,
    ) -> Self {
        let mut attributes = AttributeStore::for_export(host, username, password, defaults);
        attributes.put(AttributeKey::QueryBandSessInfo, query_band().into());
        let tenacity = TenacityPolicy::from_store(&attributes);

        debug!(host, username, "export session created");

        Self {
            transport,
            host: host.to_string(),
            username: username.to_string(),
            attributes,
            query: None,
            encoder: RowEncoder::default(),
            buffer_retry_limit,
            state: SessionState::Created,
            tenacity,
            guard: None,
            columns: None,
            buffers_read: 0,
            bytes_read: 0,
            exhausted: false,
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Overrides one attribute.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError` for reserved keys, kind mismatches and out-of-range values
    /// - `LifecycleError` once the session is Active or Terminated
    pub fn add_attribute(
        &mut self,
        key: AttributeKey,
        value: impl Into<AttributeValue>,
    ) -> Result<(), ExportError> {
        self.ensure_configurable("add attribute")?;
        let value = value.into();
        let previous = self.attributes.insert(key, value.clone())?;
        match previous {
            Some(old) if old != value => {
                debug!(key = %key, old = %old, new = %value, "attribute overridden");
            }
            Some(_) => {}
            None => debug!(key = %key, value = %value, "attribute added"),
        }
        self.mark_configured();
        Ok(())
    }

    /// Overrides one attribute addressed by name, e.g. `"max-sessions"`.
    ///
    /// # Errors
    ///
    /// As [`add_attribute`](Self::add_attribute), plus
    /// `ConfigurationError::UnknownKey` for names that are not recognized.
    pub fn add_named_attribute(
        &mut self,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<(), ExportError> {
        self.ensure_configurable("add attribute")?;
        let key: AttributeKey = name.parse()?;
        self.add_attribute(key, value)
    }

    /// Sets the query to export, or a table name to export in full.
    ///
    /// Setting the same normalized query twice is a no-op.
    pub fn set_query(&mut self, text: &str) -> Result<(), ExportError> {
        self.ensure_configurable("set query")?;
        let normalized = normalize_query(text)?;

        if normalized.dropped_statements > 0 {
            warn!(
                dropped = normalized.dropped_statements,
                query = %normalized.sql,
                "multiple statements supplied, only the first is exported"
            );
        }
        if self.query.as_deref() == Some(normalized.sql.as_str()) {
            return Ok(());
        }

        debug!(query = %normalized.sql, from_table = normalized.from_table, "query set");
        self.query = Some(normalized.sql);
        self.mark_configured();
        Ok(())
    }

    /// Merges an encoding bitmask into the current settings.
    ///
    /// # Errors
    ///
    /// `EncodingError` if the merged settings are unsupported; the settings are
    /// left unchanged.
    pub fn set_encoding(&mut self, mask: u32) -> Result<(), ExportError> {
        self.ensure_configurable("set encoding")?;
        let settings = self.encoder.set_encoding(mask)?;
        debug!(requested = %format!("0x{mask:06x}"), settings = %settings, "encoding set");
        self.mark_configured();
        Ok(())
    }

    /// Sets the text emitted for null fields, or `OverrideValue::Null` to emit nothing.
    pub fn set_null(&mut self, value: impl Into<OverrideValue>) -> Result<(), ExportError> {
        self.ensure_configurable("set null")?;
        self.encoder.set_null(value.into())?;
        self.mark_configured();
        Ok(())
    }

    /// Sets the field delimiter for text rows.
    pub fn set_delimiter(&mut self, value: impl Into<OverrideValue>) -> Result<(), ExportError> {
        self.ensure_configurable("set delimiter")?;
        self.encoder.set_delimiter(value.into())?;
        self.mark_configured();
        Ok(())
    }

    // ========================================================================
    // Stream
    // ========================================================================

    /// Opens the transport session.
    ///
    /// The handshake is retried while the transport reports itself unavailable,
    /// every `tenacity-sleep` seconds for up to `tenacity-hours`. On any error
    /// the handle is released and the session keeps its previous state.
    ///
    /// # Errors
    ///
    /// - `LifecycleError` if not Created/Configured, or no query was set
    /// - `ConfigurationError` if min-sessions exceeds max-sessions
    /// - `ConnectionError` if the handle cannot be set up or the handshake fails
    /// - `ProtocolError` if the opened stream reports no usable columns
    pub async fn initiate(&mut self) -> Result<(), ExportError> {
        if !self.state.is_configurable() {
            return Err(LifecycleError::invalid("initiate", self.state).into());
        }
        let query = self.query.clone().ok_or(LifecycleError::MissingQuery)?;
        self.attributes.validate()?;
        let tenacity = TenacityPolicy::from_store(&self.attributes);

        let handle = self
            .transport
            .open(&self.host)
            .map_err(|source| self.setup_error(source))?;
        let mut guard = HandleGuard::new(self.host.clone(), handle);
        let Some(handle) = guard.handle_mut() else {
            return Err(LifecycleError::invalid("initiate", self.state).into());
        };

        self.configure(handle, &query)?;
        info!(host = %self.host, query = %query, encoder = %self.encoder, "initiating export");
        tenacity.handshake(&self.host, handle).await?;

        let columns = handle.columns().await.map_err(ProtocolError::Columns)?;
        if columns.is_empty() {
            return Err(ProtocolError::EmptySchema.into());
        }
        debug!(host = %self.host, columns = %columns, "stream opened");

        self.tenacity = tenacity;
        self.columns = Some(columns);
        self.guard = Some(guard);
        self.state = SessionState::Active;
        Ok(())
    }

    /// Like [`initiate`](Self::initiate), bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// `ConnectionError::Timeout` if the deadline elapses first.
    pub async fn initiate_with_timeout(&mut self, timeout: Duration) -> Result<(), ExportError> {
        match tokio::time::timeout(timeout, self.initiate()).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(host = %self.host, timeout_ms, "initiate timed out");
                Err(ConnectionError::Timeout { timeout_ms }.into())
            }
        }
    }

    fn configure(&self, handle: &mut dyn ExportHandle, query: &str) -> Result<(), ConnectionError> {
        for (key, value) in self.attributes.iter() {
            handle
                .set_attribute(key, value)
                .map_err(|source| self.setup_error(source))?;
        }
        handle
            .set_query(query)
            .map_err(|source| self.setup_error(source))?;
        handle
            .set_encoder(&self.encoder)
            .map_err(|source| self.setup_error(source))?;
        Ok(())
    }

    fn setup_error(&self, source: crate::transport::TransportError) -> ConnectionError {
        ConnectionError::Setup {
            host: self.host.clone(),
            source,
        }
    }

    /// Column metadata of the open stream.
    pub fn columns(&self) -> Result<&Columns, ExportError> {
        match (&self.state, &self.columns) {
            (SessionState::Active, Some(columns)) => Ok(columns),
            _ => Err(LifecycleError::invalid("read columns", self.state).into()),
        }
    }

    /// Column names joined with the current delimiter.
    pub fn header(&self) -> Result<String, ExportError> {
        let columns = self
            .columns()
            .map_err(|_| LifecycleError::invalid("build header", self.state))?;
        Ok(self.encoder.header(columns.names()))
    }

    /// Reads the next buffer.
    ///
    /// Returns `Chunk::EndOfStream` exactly once when the stream is drained.
    /// Buffers the transport reports as temporarily unavailable are retried every
    /// `tenacity-sleep` seconds, up to the session's buffer retry limit.
    ///
    /// # Errors
    ///
    /// - `LifecycleError` if not Active, or after end of stream was reported
    /// - `ProtocolError` if the buffer cannot be retrieved
    pub async fn next(&mut self) -> Result<Chunk, ExportError> {
        if self.state != SessionState::Active {
            return Err(LifecycleError::invalid("read buffer", self.state).into());
        }
        if self.exhausted {
            return Err(LifecycleError::StreamExhausted.into());
        }
        let Some(handle) = self.guard.as_mut().and_then(HandleGuard::handle_mut) else {
            return Err(LifecycleError::invalid("read buffer", self.state).into());
        };

        let index = self.buffers_read;
        let mut retries: u32 = 0;
        loop {
            match handle.get_buffer().await {
                Ok(Some(buffer)) if !buffer.is_empty() => {
                    self.buffers_read += 1;
                    self.bytes_read += buffer.len() as u64;
                    return Ok(Chunk::Buffer(buffer));
                }
                Ok(_) => {
                    self.exhausted = true;
                    info!(
                        host = %self.host,
                        buffers = self.buffers_read,
                        bytes = self.bytes_read,
                        "end of stream"
                    );
                    return Ok(Chunk::EndOfStream);
                }
                Err(err) if err.is_retryable() => {
                    if retries >= self.buffer_retry_limit {
                        return Err(ProtocolError::RetriesExhausted {
                            index,
                            attempts: retries + 1,
                            last: err,
                        }
                        .into());
                    }
                    retries += 1;
                    debug!(index, retries, error = %err, "buffer unavailable, retrying");
                    sleep(self.tenacity.sleep).await;
                }
                Err(err) => {
                    return Err(ProtocolError::Buffer { index, source: err }.into());
                }
            }
        }
    }

    /// Releases the native handle and moves to Terminated.
    ///
    /// Safe in any state; repeated calls do nothing.
    pub fn close(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            guard.release();
        }
        if self.state != SessionState::Terminated {
            info!(host = %self.host, from = %self.state, "export session closed");
            self.state = SessionState::Terminated;
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// The normalized query, if set.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn encoder(&self) -> &RowEncoder {
        &self.encoder
    }

    pub fn encoding(&self) -> EncodingSettings {
        self.encoder.settings()
    }

    /// Non-empty buffers read so far.
    pub fn buffers_read(&self) -> u64 {
        self.buffers_read
    }

    /// Bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn ensure_configurable(&self, operation: &'static str) -> Result<(), LifecycleError> {
        if self.state.is_configurable() {
            Ok(())
        } else {
            Err(LifecycleError::invalid(operation, self.state))
        }
    }

    fn mark_configured(&mut self) {
        if self.state == SessionState::Created {
            self.state = SessionState::Configured;
        }
    }
}

impl fmt::Debug for ExportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportSession")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("state", &self.state)
            .field("query", &self.query)
            .field("encoder", &self.encoder)
            .field("attributes", &self.attributes)
            .finish()
    }
}
