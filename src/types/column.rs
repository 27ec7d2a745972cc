//! Column metadata reported by the transport when the stream opens.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of an exported column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ColumnType {
    #[serde(rename = "BYTEINT")]
    ByteInt,
    #[serde(rename = "SMALLINT")]
    SmallInt,
    #[serde(rename = "INTEGER")]
    Integer,
    #[serde(rename = "BIGINT")]
    BigInt,
    #[serde(rename = "FLOAT")]
    Float,
    #[serde(rename = "DECIMAL")]
    Decimal { precision: u8, scale: i8 },
    #[serde(rename = "CHAR")]
    Char { size: usize },
    #[serde(rename = "VARCHAR")]
    Varchar { size: usize },
    #[serde(rename = "DATE")]
    Date,
    #[serde(rename = "TIME")]
    Time,
    #[serde(rename = "TIMESTAMP")]
    Timestamp,
    #[serde(rename = "BYTE")]
    Byte { size: usize },
    #[serde(rename = "VARBYTE")]
    Varbyte { size: usize },
}

impl ColumnType {
    /// Bytes the type occupies in a fixed-width row, or the maximum for
    /// variable-width types.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            ColumnType::ByteInt => 1,
            ColumnType::SmallInt => 2,
            ColumnType::Integer | ColumnType::Date => 4,
            ColumnType::BigInt | ColumnType::Float => 8,
            ColumnType::Decimal { precision, .. } => match precision {
                0..=2 => 1,
                3..=4 => 2,
                5..=9 => 4,
                10..=18 => 8,
                _ => 16,
            },
            ColumnType::Char { size }
            | ColumnType::Varchar { size }
            | ColumnType::Byte { size }
            | ColumnType::Varbyte { size } => *size,
            ColumnType::Time => 6,
            ColumnType::Timestamp => 10,
        }
    }

    #[must_use]
    pub fn is_datetime(&self) -> bool {
        matches!(
            self,
            ColumnType::Date | ColumnType::Time | ColumnType::Timestamp
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::ByteInt => f.write_str("BYTEINT"),
            ColumnType::SmallInt => f.write_str("SMALLINT"),
            ColumnType::Integer => f.write_str("INTEGER"),
            ColumnType::BigInt => f.write_str("BIGINT"),
            ColumnType::Float => f.write_str("FLOAT"),
            ColumnType::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            ColumnType::Char { size } => write!(f, "CHAR({size})"),
            ColumnType::Varchar { size } => write!(f, "VARCHAR({size})"),
            ColumnType::Date => f.write_str("DATE"),
            ColumnType::Time => f.write_str("TIME"),
            ColumnType::Timestamp => f.write_str("TIMESTAMP"),
            ColumnType::Byte { size } => write!(f, "BYTE({size})"),
            ColumnType::Varbyte { size } => write!(f, "VARBYTE({size})"),
        }
    }
}

/// One column of the result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub column_type: ColumnType,
    pub nullable: bool,
    pub byte_size: usize,
}

impl ColumnDescriptor {
    /// Creates a nullable column whose byte size follows from its type.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let byte_size = column_type.byte_size();
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            byte_size,
        }
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.column_type)?;
        if !self.nullable {
            f.write_str(" NOT NULL")?;
        }
        Ok(())
    }
}

/// Ordered column list of an export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Columns(Vec<ColumnDescriptor>);

impl Columns {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self(columns)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDescriptor> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.name.as_str())
    }

    /// Sum of the byte sizes of all columns.
    pub fn row_size(&self) -> usize {
        self.0.iter().map(|c| c.byte_size).sum()
    }
}

impl From<Vec<ColumnDescriptor>> for Columns {
    fn from(columns: Vec<ColumnDescriptor>) -> Self {
        Self(columns)
    }
}

impl<'a> IntoIterator for &'a Columns {
    type Item = &'a ColumnDescriptor;
    type IntoIter = std::slice::Iter<'a, ColumnDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Columns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, column) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{column}")?;
        }
        f.write_str("]")
    }
}
