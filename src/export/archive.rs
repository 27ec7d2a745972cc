//! Archive format: raw buffers prefixed with the column list.
//!
//! Layout:
//! - 4 bytes: magic `TPTA`
//! - 2 bytes: format version (little-endian)
//! - 4 bytes: length of the column list (little-endian)
//! - the column list as JSON
//! - raw row buffers until end of file

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use super::stream::{ensure_initiated, ExportSummary};
use crate::encoding::ARCHIVE;
use crate::error::{ExportError, LifecycleError};
use crate::session::{Chunk, ExportSession};
use crate::types::Columns;

/// Archive magic number.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"TPTA";

/// Archive format version.
pub const ARCHIVE_VERSION: u16 = 1;

/// Size of the fixed archive header preceding the column list.
pub const ARCHIVE_PREAMBLE_SIZE: usize = 10;

/// Largest column list accepted when reading an archive, in bytes.
pub const MAX_ARCHIVE_HEADER_SIZE: u32 = 16 * 1024 * 1024;

/// Writes the archive preamble and column list.
pub fn encode_archive_header(columns: &Columns) -> Result<Vec<u8>, ExportError> {
    let json = serde_json::to_vec(columns)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(json.len())
        .ok()
        .filter(|len| *len <= MAX_ARCHIVE_HEADER_SIZE)
        .ok_or_else(|| invalid_data("column list too large for archive"))?;

    let mut header = Vec::with_capacity(ARCHIVE_PREAMBLE_SIZE + json.len());
    header.extend_from_slice(&ARCHIVE_MAGIC);
    header.extend_from_slice(&ARCHIVE_VERSION.to_le_bytes());
    header.extend_from_slice(&len.to_le_bytes());
    header.extend_from_slice(&json);
    Ok(header)
}

/// Reads the archive preamble and column list, leaving `reader` at the first
/// raw buffer.
///
/// # Errors
///
/// `ExportError::Io` with `InvalidData` for a wrong magic number, an unknown
/// version, a column list longer than [`MAX_ARCHIVE_HEADER_SIZE`], or a
/// malformed column list.
pub async fn read_archive_header<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Columns, ExportError> {
    let mut preamble = [0u8; ARCHIVE_PREAMBLE_SIZE];
    reader.read_exact(&mut preamble).await?;

    if preamble[0..4] != ARCHIVE_MAGIC {
        return Err(invalid_data("not an archive: bad magic number"));
    }
    let version = u16::from_le_bytes([preamble[4], preamble[5]]);
    if version != ARCHIVE_VERSION {
        return Err(invalid_data(&format!("unsupported archive version {version}")));
    }
    let len = u32::from_le_bytes([preamble[6], preamble[7], preamble[8], preamble[9]]);
    if len > MAX_ARCHIVE_HEADER_SIZE {
        return Err(invalid_data(&format!(
            "column list of {len} bytes exceeds {MAX_ARCHIVE_HEADER_SIZE}"
        )));
    }

    let mut json = vec![0u8; len as usize];
    reader.read_exact(&mut json).await?;
    serde_json::from_slice(&json)
        .map_err(|e| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn invalid_data(message: &str) -> ExportError {
    ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, message.to_string()))
}

/// Exports the session as an archive.
///
/// The session must not be initiated yet: raw row encoding is forced before the
/// stream opens. The session is closed either way.
///
/// # Errors
///
/// `LifecycleError` if the session is already Active or Terminated, otherwise any
/// error from the session or the writer.
pub async fn write_archive<W: AsyncWrite + Unpin>(
    session: &mut ExportSession,
    writer: W,
) -> Result<ExportSummary, ExportError> {
    let result = archive(session, writer).await;
    session.close();
    result
}

async fn archive<W: AsyncWrite + Unpin>(
    session: &mut ExportSession,
    mut writer: W,
) -> Result<ExportSummary, ExportError> {
    if !session.state().is_configurable() {
        return Err(LifecycleError::invalid("write archive", session.state()).into());
    }
    session.set_encoding(ARCHIVE)?;
    ensure_initiated(session, None).await?;

    let header = encode_archive_header(session.columns()?)?;
    writer.write_all(&header).await?;

    let mut summary = ExportSummary {
        bytes_written: header.len() as u64,
        ..ExportSummary::default()
    };
    while let Chunk::Buffer(buffer) = session.next().await? {
        writer.write_all(&buffer).await?;
        summary.buffers += 1;
        summary.bytes += buffer.len() as u64;
        summary.bytes_written += buffer.len() as u64;
    }
    writer.flush().await?;

    info!(buffers = summary.buffers, bytes = summary.bytes, "archive written");
    Ok(summary)
}
