//! Column metadata and its mapping to Arrow data types.

mod column;
mod mapping;

pub use column::{ColumnDescriptor, ColumnType, Columns};
pub use mapping::TypeMapper;
