//! Builder for the SELECT statement an export session runs.
//!
//! Callers either hand over free-form text, which is normalized, or name a table
//! and optional column list, which is rendered into a select.

use std::fmt;

use super::statement::{normalize_query, NormalizedQuery};
use crate::error::ConfigurationError;

/// Source for the export: either a table or a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSource {
    /// Export from a table.
    Table {
        /// Database (schema) name, if qualified.
        database: Option<String>,
        /// Table name.
        name: String,
        /// Columns to export; empty means all columns.
        columns: Vec<String>,
    },
    /// Export the results of a query.
    Query {
        /// Query text as supplied by the caller.
        sql: String,
    },
}

/// Builder for constructing the export statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportQuery {
    source: ExportSource,
    where_clause: Option<String>,
}

impl ExportQuery {
    /// Create an export query from a table.
    pub fn from_table(table: &str) -> Self {
        Self {
            source: ExportSource::Table {
                database: None,
                name: table.to_string(),
                columns: Vec::new(),
            },
            where_clause: None,
        }
    }

    /// Create an export query from query text.
    pub fn from_query(sql: &str) -> Self {
        Self {
            source: ExportSource::Query {
                sql: sql.to_string(),
            },
            where_clause: None,
        }
    }

    /// Qualify the table with a database name. No effect for query sources.
    #[must_use]
    pub fn database(mut self, database: &str) -> Self {
        if let ExportSource::Table {
            database: ref mut db,
            ..
        } = self.source
        {
            *db = Some(database.to_string());
        }
        self
    }

    /// Restrict the exported columns. No effect for query sources.
    #[must_use]
    pub fn columns(mut self, cols: Vec<&str>) -> Self {
        if let ExportSource::Table {
            ref mut columns, ..
        } = self.source
        {
            *columns = cols.into_iter().map(String::from).collect();
        }
        self
    }

    /// Filter exported table rows. No effect for query sources.
    #[must_use]
    pub fn filter(mut self, condition: &str) -> Self {
        if matches!(self.source, ExportSource::Table { .. }) {
            self.where_clause = Some(condition.to_string());
        }
        self
    }

    pub fn source(&self) -> &ExportSource {
        &self.source
    }

    /// Render the statement text before normalization.
    pub fn to_sql(&self) -> String {
        match &self.source {
            ExportSource::Table {
                database,
                name,
                columns,
            } => {
                let table = match database {
                    Some(db) => format!("{db}.{name}"),
                    None => name.clone(),
                };
                let projection = if columns.is_empty() {
                    "*".to_string()
                } else {
                    columns.join(", ")
                };
                let mut sql = format!("select {projection} from {table}");
                if let Some(condition) = &self.where_clause {
                    sql.push_str(" where ");
                    sql.push_str(condition);
                }
                sql
            }
            ExportSource::Query { sql } => sql.clone(),
        }
    }

    /// Render and normalize the statement.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidQuery` when no statement remains.
    pub fn build(&self) -> Result<NormalizedQuery, ConfigurationError> {
        normalize_query(&self.to_sql())
    }
}

impl fmt::Display for ExportQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

impl From<&str> for ExportQuery {
    fn from(sql: &str) -> Self {
        Self::from_query(sql)
    }
}

impl From<String> for ExportQuery {
    fn from(sql: String) -> Self {
        Self::from_query(&sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_from_table_basic() {
        let sql = ExportQuery::from_table("users").to_sql();
        assert_eq!(sql, "select * from users");
    }

    #[test]
    fn test_export_from_table_with_database_and_columns() {
        let sql = ExportQuery::from_table("users")
            .database("sales")
            .columns(vec!["id", "name"])
            .to_sql();
        assert_eq!(sql, "select id, name from sales.users");
    }

    #[test]
    fn test_export_from_table_with_filter() {
        let sql = ExportQuery::from_table("orders")
            .filter("amount > 100")
            .to_sql();
        assert_eq!(sql, "select * from orders where amount > 100");
    }

    #[test]
    fn test_export_from_query_ignores_table_options() {
        let q = ExportQuery::from_query("select 1")
            .database("ignored")
            .columns(vec!["a"])
            .filter("b = 1");
        assert_eq!(q.to_sql(), "select 1");
        assert!(matches!(q.source(), ExportSource::Query { .. }));
    }

    #[test]
    fn test_build_normalizes() {
        let q = ExportQuery::from_query("select 1; select 2").build().unwrap();
        assert_eq!(q.sql, "select 1");
        assert_eq!(q.dropped_statements, 1);

        let q = ExportQuery::from("dbc.dbcinfo").build().unwrap();
        assert_eq!(q.sql, "select * from dbc.dbcinfo");
    }
}
