//! Table schemas read from the DuckDB catalog

use duckdb::Connection;
use quack_registry::{SchemaError, SchemaProvider, TableSchema};

/// Schema provider backed by `information_schema`
pub struct DuckSchemaProvider<'a> {
    conn: &'a Connection,
}

impl<'a> DuckSchemaProvider<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Base tables and views in the main schema, by name
    pub fn list_tables(&self) -> Result<Vec<String>, SchemaError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'main' ORDER BY table_name",
            )
            .map_err(|e| SchemaError::Lookup(format!("Failed to prepare table query: {}", e)))?;

        stmt.query_map([], |row| row.get(0))
            .map_err(|e| SchemaError::Lookup(format!("Table query failed: {}", e)))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| SchemaError::Lookup(format!("Failed to read table rows: {}", e)))
    }
}

impl SchemaProvider for DuckSchemaProvider<'_> {
    fn table_schema(&self, table: &str) -> Result<TableSchema, SchemaError> {
        let query = "
            SELECT column_name, data_type
            FROM information_schema.columns
            WHERE table_name = ? AND table_schema = 'main'
            ORDER BY ordinal_position
        ";

        let mut stmt = self
            .conn
            .prepare(query)
            .map_err(|e| SchemaError::Lookup(format!("Failed to prepare schema query: {}", e)))?;

        let columns = stmt
            .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| SchemaError::Lookup(format!("Schema query failed: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SchemaError::Lookup(format!("Failed to read schema rows: {}", e)))?;

        if columns.is_empty() {
            return Err(SchemaError::TableNotFound(table.to_string()));
        }

        Ok(TableSchema::from_columns(table, columns))
    }
}
