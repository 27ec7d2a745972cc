//! High-level export helpers built on [`ExportSession`](crate::ExportSession).
//!
//! - `stream` - drain a session into a writer, a file or memory, with optional
//!   gzip/bzip2 compression
//! - `archive` - raw buffers prefixed with the column list
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use tpt_export::export::{export_to_file, Compression, ExportOptions};
//!
//! session.set_query("select * from sales.orders")?;
//! let summary = export_to_file(
//!     &mut session,
//!     Path::new("/tmp/orders.csv.gz"),
//!     ExportOptions::new()
//!         .compression(Compression::Gzip)
//!         .with_header(true),
//! )
//! .await?;
//! println!("{} buffers, {} bytes", summary.buffers, summary.bytes);
//! ```

pub mod archive;
pub mod stream;

pub use archive::{
    encode_archive_header, read_archive_header, write_archive, ARCHIVE_MAGIC,
    ARCHIVE_PREAMBLE_SIZE, ARCHIVE_VERSION, MAX_ARCHIVE_HEADER_SIZE,
};
pub use stream::{
    export_to_file, export_to_list, export_to_stream, Compression, ExportOptions, ExportSummary,
};
