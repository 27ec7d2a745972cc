//! Query text handling.
//!
//! - `statement` - normalization of caller-supplied query text
//! - `export` - builder rendering a table or query source into a select

pub mod export;
pub mod statement;

pub use export::{ExportQuery, ExportSource};
pub use statement::{normalize_query, replace_curly_quotes, NormalizedQuery};
