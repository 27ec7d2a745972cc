//! # tpt-export
//!
//! Client-side controller for parallel-transport export sessions.
//!
//! An [`ExportSession`] accumulates connection attributes, a query and encoder
//! settings, opens the transport session with a tenacity retry envelope, and then
//! streams result buffers until end of stream. The native handle is owned by the
//! session and released exactly once, whether the session is closed explicitly or
//! dropped.
//!
//! ## Features
//!
//! - **Typed attributes**: a closed set of keys, each accepting one value kind
//! - **Encoding settings**: row, datetime and decimal categories merged per category
//! - **Tenacity**: handshakes retried while the server queues logons
//! - **Export helpers**: files, streams, in-memory lists and archives, with gzip or
//!   bzip2 compression
//! - **Arrow schema**: column metadata mapped to an Arrow `Schema`
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tpt_export::*;
//!
//! # async fn example(transport: Arc<dyn ExportTransport>) -> Result<(), ExportError> {
//! let mut session = ExportSession::new(transport, "dbc", "user", "pass");
//! session.add_attribute(AttributeKey::MaxSessions, 10)?;
//! session.set_encoding(VALUES)?;
//! session.set_query("select id, name from sales.customers")?;
//!
//! session.initiate().await?;
//! println!("{}", session.header()?);
//! while let Chunk::Buffer(bytes) = session.next().await? {
//!     println!("{} bytes", bytes.len());
//! }
//! session.close();
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod attributes;
pub mod encoding;
pub mod error;
pub mod export;
pub mod query;
pub mod session;
pub mod transport;
pub mod types;

// =============================================================================
// Session
// =============================================================================

/// Re-export the session controller and its lifecycle types.
pub use session::{
    query_band, Chunk, ExportSession, HandleGuard, SessionOptions, SessionState,
    TenacityPolicy, DEFAULT_BUFFER_RETRY_LIMIT, UTILITY_NAME,
};

// =============================================================================
// Error Types
// =============================================================================

/// Re-export error types for convenient error handling.
pub use error::{
    ConfigurationError, ConnectionError, EncodingError, ExportError, LifecycleError,
    ProtocolError,
};

// =============================================================================
// Attributes
// =============================================================================

pub use attributes::{AttributeKey, AttributeStore, AttributeValue, SessionDefaults, ValueKind};

// =============================================================================
// Encoding
// =============================================================================

pub use encoding::{
    DatetimeEncoding, DecimalEncoding, EncodingSettings, OverrideValue, RowEncoder,
    RowEncoding, ARCHIVE, DATETIME_AS_NATIVE, DATETIME_AS_STRING, DECIMAL_AS_FLOAT,
    DECIMAL_AS_NATIVE, DECIMAL_AS_STRING, ITEMS, ROW_ENCODING_DICT, ROW_ENCODING_LIST,
    ROW_ENCODING_RAW, ROW_ENCODING_STRING, STRINGS, VALUES,
};

// =============================================================================
// Transport
// =============================================================================

pub use transport::{ExportHandle, ExportTransport, MemoryTransport, TransportError};

// =============================================================================
// Type System
// =============================================================================

/// Re-export column metadata and type mapping utilities.
pub use types::{ColumnDescriptor, ColumnType, Columns, TypeMapper};

// =============================================================================
// Query Builder Types
// =============================================================================

/// Query builder and normalization.
///
/// ```
/// use tpt_export::query::ExportQuery;
///
/// let query = ExportQuery::from_table("customers")
///     .database("sales")
///     .columns(vec!["id", "name"])
///     .build()
///     .unwrap();
/// assert_eq!(query.sql, "select id, name from sales.customers");
/// ```
pub use query::{normalize_query, ExportQuery, ExportSource, NormalizedQuery};

// =============================================================================
// Export Helpers
// =============================================================================

pub use export::{
    export_to_file, export_to_list, export_to_stream, write_archive, Compression,
    ExportOptions, ExportSummary,
};
