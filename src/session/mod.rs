//! Export session lifecycle.
//!
//! - `lifecycle` - session states, stream chunks and the handle guard
//! - `tenacity` - retry envelope for opening the transport session
//! - `options` - construction options
//! - `export_session` - the session controller

mod export_session;
mod lifecycle;
mod options;
mod tenacity;

pub use export_session::{query_band, ExportSession, UTILITY_NAME};
pub use lifecycle::{Chunk, HandleGuard, SessionState};
pub use options::{SessionOptions, DEFAULT_BUFFER_RETRY_LIMIT};
pub use tenacity::TenacityPolicy;
