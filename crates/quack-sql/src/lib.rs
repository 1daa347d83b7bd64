//! Analysis request to DuckDB SQL compilation
//!
//! [`clause`] renders the individual clauses; [`QueryCompiler`] validates a
//! request against a table schema and assembles the full statement.

use quack_ir::{AnalysisOperation, AnalysisRequest, ErrorKind, FilterOperator, UnknownOperation};
use quack_registry::RegistryError;
use thiserror::Error;

pub mod clause;
mod compiler;

pub use compiler::{quick_request, AnalysisExample, QueryCompiler};

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Unsupported(#[from] RegistryError),

    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperation),

    #[error("Operation '{0}' has no single-column template")]
    UnsupportedOperation(AnalysisOperation),

    #[error("Incompatible composition: {0}")]
    IncompatibleComposition(String),

    #[error("Invalid filter on '{column}': {reason}")]
    InvalidFilter { column: String, reason: String },

    #[error("Column '{column}' not found in table '{table}'")]
    UnknownColumn { column: String, table: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Unsupported(_) | CompileError::UnknownOperation(_) => ErrorKind::UnsupportedAnalysis,
            CompileError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            CompileError::IncompatibleComposition(_) => ErrorKind::IncompatibleComposition,
            CompileError::InvalidFilter { .. } => ErrorKind::InvalidFilter,
            CompileError::UnknownColumn { .. } => ErrorKind::UnknownColumn,
            CompileError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

fn entries<'a>(body: &'a serde_json::Value, field: &str) -> &'a [serde_json::Value] {
    body.get(field)
        .and_then(|v| v.as_array())
        .map(|items| items.as_slice())
        .unwrap_or_default()
}

/// Deserialize a request body
///
/// Unknown operation names and filter operators surface as their own error
/// kinds; any other shape problem is an invalid request.
pub fn parse_request(body: serde_json::Value) -> Result<AnalysisRequest, CompileError> {
    for name in entries(&body, "operations")
        .iter()
        .filter_map(|op| op.get("operation")?.as_str())
    {
        name.parse::<AnalysisOperation>()?;
    }

    for filter in entries(&body, "filters") {
        if let Some(operator) = filter.get("operator").and_then(|v| v.as_str()) {
            FilterOperator::try_from(operator.to_string()).map_err(|reason| CompileError::InvalidFilter {
                column: filter
                    .get("column")
                    .and_then(|c| c.as_str())
                    .unwrap_or_default()
                    .to_string(),
                reason,
            })?;
        }
    }

    serde_json::from_value(body).map_err(|e| CompileError::InvalidRequest(e.to_string()))
}
