//! Table metadata and the provider trait used to look it up

use quack_ir::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::classify::classify;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Schema lookup failed: {0}")]
    Lookup(String),
}

/// A column with its derived category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub raw_type: String,
    pub category: Category,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        let raw_type = raw_type.into();
        Self {
            name: name.into(),
            category: classify(&raw_type),
            raw_type,
        }
    }
}

/// Snapshot of one table's columns, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    /// Build from the `(column, raw type)` pairs reported by ingestion
    pub fn from_columns<I, N, T>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns
                .into_iter()
                .map(|(n, t)| ColumnDescriptor::new(n, t))
                .collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn columns_in(&self, category: Category) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(move |c| c.category == category)
    }
}

/// Resolves table schemas for compilation
pub trait SchemaProvider {
    fn table_schema(&self, table: &str) -> Result<TableSchema, SchemaError>;
}

/// In-memory provider, for callers that already hold the schema
#[derive(Debug, Default)]
pub struct StaticSchemaProvider {
    tables: HashMap<String, TableSchema>,
}

impl StaticSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, schema: TableSchema) {
        self.tables.insert(schema.name.clone(), schema);
    }

    pub fn with_table(mut self, schema: TableSchema) -> Self {
        self.add_table(schema);
        self
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn table_schema(&self, table: &str) -> Result<TableSchema, SchemaError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| SchemaError::TableNotFound(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_classifies_columns() {
        let schema = TableSchema::from_columns(
            "t",
            [("id", "INTEGER"), ("category", "VARCHAR"), ("amount", "DECIMAL(10,2)")],
        );

        assert_eq!(schema.column("id").unwrap().category, Category::Numeric);
        assert_eq!(schema.column("category").unwrap().category, Category::Text);
        assert_eq!(schema.column("amount").unwrap().raw_type, "DECIMAL(10,2)");
        assert!(schema.column("missing").is_none());

        let numeric: Vec<_> = schema
            .columns_in(Category::Numeric)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(numeric, vec!["id", "amount"]);
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticSchemaProvider::new()
            .with_table(TableSchema::from_columns("users", [("name", "VARCHAR")]));

        assert_eq!(provider.table_schema("users").unwrap().columns.len(), 1);
        assert!(matches!(
            provider.table_schema("orders"),
            Err(SchemaError::TableNotFound(t)) if t == "orders"
        ));
    }
}
