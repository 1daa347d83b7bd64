//! DuckDB executor for compiled analyses

use std::path::Path;

use duckdb::{params_from_iter, AccessMode, Config, Connection};
use quack_ir::{AnalysisRequest, AnalysisResult, CompiledQuery, ErrorKind};
use quack_registry::{SchemaError, SchemaProvider, TableSchema};
use quack_sql::clause::{ident, DEFAULT_TOP_K};
use quack_sql::{quick_request, CompileError, QueryCompiler};
use thiserror::Error;
use tracing::{debug, info, warn};

mod schema;
mod value;

pub use schema::DuckSchemaProvider;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),
}

/// Any failure between receiving a request and returning its rows
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Table '{0}' has no numeric columns")]
    NoNumericColumns(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Compile(e) => e.kind(),
            AnalysisError::Schema(SchemaError::TableNotFound(_)) => ErrorKind::Schema,
            AnalysisError::Schema(SchemaError::Lookup(_)) => ErrorKind::Execution,
            AnalysisError::Execution(_) => ErrorKind::Execution,
            AnalysisError::NoNumericColumns(_) => ErrorKind::InvalidRequest,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionBudget {
    pub max_rows: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn into_analysis_result(self, sql_preview: impl Into<String>) -> AnalysisResult {
        AnalysisResult {
            columns: self.columns,
            rows: self.rows,
            sql_preview: sql_preview.into(),
        }
    }
}

pub struct DuckExecutor {
    conn: Connection,
    budget: ExecutionBudget,
    default_top_k: u64,
}

impl DuckExecutor {
    pub fn new() -> Result<Self, ExecutionError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExecutionError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self, ExecutionError> {
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        Ok(Self::from_connection(Connection::open_with_flags(path, config)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            budget: ExecutionBudget::default(),
            default_top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_budget(mut self, budget: ExecutionBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_default_top_k(mut self, k: u64) -> Self {
        self.default_top_k = k;
        self
    }

    /// A second handle on the same database, with the same settings
    pub fn try_clone(&self) -> Result<Self, ExecutionError> {
        Ok(Self {
            conn: self.conn.try_clone()?,
            budget: self.budget,
            default_top_k: self.default_top_k,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema_provider(&self) -> DuckSchemaProvider<'_> {
        DuckSchemaProvider::new(&self.conn)
    }

    pub fn table_schema(&self, table: &str) -> Result<TableSchema, SchemaError> {
        self.schema_provider().table_schema(table)
    }

    /// Run a compiled query with its parameters bound
    pub fn execute(&self, query: &CompiledQuery) -> Result<QueryResult, ExecutionError> {
        let params: Vec<duckdb::types::Value> = query.params.iter().map(value::to_param).collect();
        self.run(&query.sql, params)
    }

    /// Run caller-supplied SQL as is
    pub fn execute_sql(&self, sql: &str) -> Result<QueryResult, ExecutionError> {
        self.run(sql, Vec::new())
    }

    /// DuckDB's physical plan for `sql`
    pub fn explain(&self, sql: &str) -> Result<String, ExecutionError> {
        let result = self.run(&format!("EXPLAIN {}", sql), Vec::new())?;
        let plan_column = result.columns.len().saturating_sub(1);

        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.get(plan_column).and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    pub fn sample_rows(&self, table: &str, n: u64) -> Result<QueryResult, ExecutionError> {
        self.execute_sql(&format!("SELECT * FROM {} LIMIT {}", ident(table), n))
    }

    /// Resolve the schema, compile and execute
    pub fn run_analysis(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let schema = self.table_schema(&request.table)?;
        self.run_against(&schema, request)
    }

    /// Average of every numeric column in `table`
    pub fn quick_analysis(&self, table: &str) -> Result<AnalysisResult, AnalysisError> {
        let schema = self.table_schema(table)?;
        let request = quick_request(&schema).ok_or_else(|| AnalysisError::NoNumericColumns(table.to_string()))?;
        self.run_against(&schema, &request)
    }

    fn run_against(&self, schema: &TableSchema, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let compiled = QueryCompiler::new(schema)
            .with_default_top_k(self.default_top_k)
            .compile(request)?;

        let result = self.execute(&compiled).map_err(|e| {
            warn!(table = %request.table, error = %e, sql = %compiled.preview, "analysis failed");
            e
        })?;

        info!(
            table = %request.table,
            fingerprint = %request.fingerprint(),
            rows = result.row_count,
            "analysis executed"
        );
        Ok(result.into_analysis_result(compiled.preview))
    }

    fn run(&self, sql: &str, params: Vec<duckdb::types::Value>) -> Result<QueryResult, ExecutionError> {
        debug!(sql = %sql, params = params.len(), "executing");

        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params))?;

        let columns: Vec<String> = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();

        let mut result_rows = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(max_rows) = self.budget.max_rows {
                if result_rows.len() as u64 >= max_rows {
                    return Err(ExecutionError::BudgetExceeded(format!(
                        "Max rows ({}) exceeded",
                        max_rows
                    )));
                }
            }

            let cells = (0..columns.len())
                .map(|i| value::to_json(row.get_ref(i)?))
                .collect::<Result<Vec<_>, _>>()?;
            result_rows.push(cells);
        }

        Ok(QueryResult {
            row_count: result_rows.len(),
            columns,
            rows: result_rows,
        })
    }
}
