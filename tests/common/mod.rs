//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use tpt_export::transport::MemoryLog;
use tpt_export::{ColumnDescriptor, ColumnType, Columns, ExportSession, MemoryTransport};

pub const HOST: &str = "h";
pub const USER: &str = "u";
pub const PASSWORD: &str = "p";

/// The two-column result set used by most scenarios.
pub fn id_name_columns() -> Columns {
    Columns::new(vec![
        ColumnDescriptor::new("id", ColumnType::Integer),
        ColumnDescriptor::new("name", ColumnType::Varchar { size: 32 }),
    ])
}

/// `count` text buffers of one row each.
pub fn row_buffers(count: usize) -> Vec<Bytes> {
    (1..=count)
        .map(|i| Bytes::from(format!("{i}|name-{i}\n")))
        .collect()
}

pub fn transport(buffers: usize) -> MemoryTransport {
    MemoryTransport::new(id_name_columns(), row_buffers(buffers))
}

/// A session over `transport`, with the log of its handles.
pub fn session_over(transport: MemoryTransport) -> (ExportSession, Arc<MemoryLog>) {
    let log = transport.log();
    let session = ExportSession::new(Arc::new(transport), HOST, USER, PASSWORD);
    (session, log)
}
