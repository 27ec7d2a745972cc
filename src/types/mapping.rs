//! Type mapping between exported column types and Apache Arrow data types.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

use super::column::{ColumnDescriptor, ColumnType, Columns};
use crate::encoding::{DatetimeEncoding, DecimalEncoding, EncodingSettings};

const TYPE_KEY: &str = "tpt:type";
const BYTE_SIZE_KEY: &str = "tpt:byte_size";

/// Type mapper for converting column types to Arrow types.
pub struct TypeMapper;

impl TypeMapper {
    /// Convert a column type to its native Arrow DataType.
    pub fn column_to_arrow(column_type: &ColumnType) -> DataType {
        match column_type {
            ColumnType::ByteInt => DataType::Int8,
            ColumnType::SmallInt => DataType::Int16,
            ColumnType::Integer => DataType::Int32,
            ColumnType::BigInt => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale),
            ColumnType::Char { .. } | ColumnType::Varchar { .. } => DataType::Utf8,
            ColumnType::Date => DataType::Date32,
            ColumnType::Time => DataType::Time64(TimeUnit::Microsecond),
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            ColumnType::Byte { size } => match i32::try_from(*size) {
                Ok(width) => DataType::FixedSizeBinary(width),
                Err(_) => DataType::Binary,
            },
            ColumnType::Varbyte { .. } => DataType::Binary,
        }
    }

    /// Convert a column type to the Arrow DataType its values arrive as under
    /// `settings`.
    ///
    /// Datetimes and decimals encoded as strings map to `Utf8`; decimals encoded as
    /// floats map to `Float64`.
    pub fn encoded_to_arrow(column_type: &ColumnType, settings: &EncodingSettings) -> DataType {
        match column_type {
            t if t.is_datetime() && settings.datetime == DatetimeEncoding::String => {
                DataType::Utf8
            }
            ColumnType::Decimal { .. } => match settings.decimal {
                DecimalEncoding::String => DataType::Utf8,
                DecimalEncoding::Float => DataType::Float64,
                DecimalEncoding::Native => Self::column_to_arrow(column_type),
            },
            other => Self::column_to_arrow(other),
        }
    }

    /// Field metadata preserving the declared column type.
    pub fn create_field_metadata(column: &ColumnDescriptor) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert(TYPE_KEY.to_string(), column.column_type.to_string());
        metadata.insert(BYTE_SIZE_KEY.to_string(), column.byte_size.to_string());
        metadata
    }

    fn field(column: &ColumnDescriptor, data_type: DataType) -> Field {
        Field::new(&column.name, data_type, column.nullable)
            .with_metadata(Self::create_field_metadata(column))
    }
}

impl Columns {
    /// Arrow schema with each column's native type.
    pub fn to_arrow_schema(&self) -> Arc<Schema> {
        let fields: Vec<Field> = self
            .iter()
            .map(|c| TypeMapper::field(c, TypeMapper::column_to_arrow(&c.column_type)))
            .collect();
        Arc::new(Schema::new(fields))
    }

    /// Arrow schema matching how values are encoded under `settings`.
    pub fn to_encoded_arrow_schema(&self, settings: &EncodingSettings) -> Arc<Schema> {
        let fields: Vec<Field> = self
            .iter()
            .map(|c| TypeMapper::field(c, TypeMapper::encoded_to_arrow(&c.column_type, settings)))
            .collect();
        Arc::new(Schema::new(fields))
    }
}
