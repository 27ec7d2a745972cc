//! Draining an export session into files, streams and memory.
//!
//! Every helper initiates the session if it has not been initiated yet, reads
//! buffers until end of stream, and closes the session whether or not the export
//! succeeded.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::error::ExportError;
use crate::session::{Chunk, ExportSession, SessionState};

/// Compression options for export output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression
    #[default]
    None,
    /// Gzip compression (.gz extension)
    Gzip,
    /// Bzip2 compression (.bz2 extension)
    Bzip2,
}

impl Compression {
    /// Get the file extension for the compression type.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
        }
    }

    /// Guess the compression from a file name.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("bz2") => Compression::Bzip2,
            _ => Compression::None,
        }
    }
}

/// Options for the export helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Output compression (default: None).
    pub compression: Compression,

    /// Write the column names as the first line (default: false).
    pub with_header: bool,

    /// Deadline for opening the transport session, in milliseconds.
    ///
    /// `None` (the default) waits for the whole tenacity window.
    pub timeout_ms: Option<u64>,
}

impl ExportOptions {
    /// Creates new export options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_header(mut self, include: bool) -> Self {
        self.with_header = include;
        self
    }

    /// Sets the initiate timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout_ms = Some(timeout);
        self
    }
}

/// Totals of a finished export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Buffers read from the session.
    pub buffers: u64,
    /// Bytes read from the session.
    pub bytes: u64,
    /// Bytes written to the destination, after compression.
    pub bytes_written: u64,
}

/// Streaming compressor writing into an in-memory buffer that is drained after
/// every write.
enum Compressor {
    None,
    Gzip(GzEncoder<Vec<u8>>),
    Bzip2(BzEncoder<Vec<u8>>),
}

impl Compressor {
    fn new(compression: Compression) -> Self {
        match compression {
            Compression::None => Compressor::None,
            Compression::Gzip => {
                Compressor::Gzip(GzEncoder::new(Vec::new(), flate2::Compression::default()))
            }
            Compression::Bzip2 => {
                Compressor::Bzip2(BzEncoder::new(Vec::new(), bzip2::Compression::default()))
            }
        }
    }

    /// Compresses `data`, returning whatever output is ready.
    fn compress(&mut self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Compressor::None => Ok(data.to_vec()),
            Compressor::Gzip(encoder) => {
                encoder.write_all(data)?;
                Ok(std::mem::take(encoder.get_mut()))
            }
            Compressor::Bzip2(encoder) => {
                encoder.write_all(data)?;
                Ok(std::mem::take(encoder.get_mut()))
            }
        }
    }

    /// Flushes the trailing output.
    fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            Compressor::None => Ok(Vec::new()),
            Compressor::Gzip(encoder) => encoder.finish(),
            Compressor::Bzip2(encoder) => encoder.finish(),
        }
    }
}

/// Initiates the session unless it is already Active.
pub(crate) async fn ensure_initiated(
    session: &mut ExportSession,
    timeout_ms: Option<u64>,
) -> Result<(), ExportError> {
    if session.state() == SessionState::Active {
        return Ok(());
    }
    match timeout_ms {
        Some(ms) => {
            session
                .initiate_with_timeout(Duration::from_millis(ms))
                .await
        }
        None => session.initiate().await,
    }
}

/// Exports every buffer of the session to an async writer.
///
/// # Errors
///
/// Returns `ExportError` if the session fails or the writer reports an I/O error.
/// The session is closed either way.
pub async fn export_to_stream<W: AsyncWrite + Unpin>(
    session: &mut ExportSession,
    writer: W,
    options: ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let result = drain_to_writer(session, writer, &options).await;
    session.close();
    result
}

async fn drain_to_writer<W: AsyncWrite + Unpin>(
    session: &mut ExportSession,
    mut writer: W,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    ensure_initiated(session, options.timeout_ms).await?;

    let mut compressor = Compressor::new(options.compression);
    let mut summary = ExportSummary::default();

    if options.with_header {
        let mut line = session.header()?;
        line.push('\n');
        let out = compressor.compress(line.as_bytes())?;
        writer.write_all(&out).await?;
        summary.bytes_written += out.len() as u64;
    }

    while let Chunk::Buffer(buffer) = session.next().await? {
        summary.buffers += 1;
        summary.bytes += buffer.len() as u64;
        let out = compressor.compress(&buffer)?;
        if !out.is_empty() {
            writer.write_all(&out).await?;
            summary.bytes_written += out.len() as u64;
        }
    }

    let tail = compressor.finish()?;
    writer.write_all(&tail).await?;
    summary.bytes_written += tail.len() as u64;
    writer.flush().await?;

    info!(
        buffers = summary.buffers,
        bytes = summary.bytes,
        written = summary.bytes_written,
        "export finished"
    );
    Ok(summary)
}

/// Exports every buffer of the session to a file.
///
/// # Errors
///
/// Returns `ExportError` if the file cannot be created or the export fails.
/// The session is closed either way.
pub async fn export_to_file(
    session: &mut ExportSession,
    file_path: &Path,
    options: ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let file = match File::create(file_path).await {
        Ok(file) => file,
        Err(err) => {
            session.close();
            return Err(err.into());
        }
    };
    debug!(path = %file_path.display(), compression = ?options.compression, "exporting to file");
    export_to_stream(session, BufWriter::new(file), options).await
}

/// Collects every buffer of the session in memory.
///
/// # Errors
///
/// Returns `ExportError` if the session fails. The session is closed either way.
pub async fn export_to_list(session: &mut ExportSession) -> Result<Vec<Bytes>, ExportError> {
    let result = collect_buffers(session).await;
    session.close();
    result
}

async fn collect_buffers(session: &mut ExportSession) -> Result<Vec<Bytes>, ExportError> {
    ensure_initiated(session, None).await?;
    let mut buffers = Vec::new();
    while let Chunk::Buffer(buffer) = session.next().await? {
        buffers.push(buffer);
    }
    Ok(buffers)
}
