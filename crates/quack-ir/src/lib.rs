//! QuackView analysis model
//!
//! Structured analysis requests, the compiled statements derived from them and
//! the result envelope handed back to callers. All types serialize
//! deterministically so identical requests fingerprint identically.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

mod types;
pub use types::*;

/// A structured analysis over one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use = "builders have no effect until compiled"]
pub struct AnalysisRequest {
    pub table: String,

    pub operations: Vec<OperationSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterCondition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort_by: Vec<SortKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u64>,
}

impl AnalysisRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            operations: Vec::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            sort_by: Vec::new(),
            limit: None,
            top_k: None,
        }
    }

    pub fn operation(mut self, column: impl Into<String>, operation: AnalysisOperation) -> Self {
        self.operations.push(OperationSpec::new(column, operation));
        self
    }

    pub fn correlation(mut self, column: impl Into<String>, second: impl Into<String>) -> Self {
        self.operations.push(OperationSpec {
            column: column.into(),
            operation: AnalysisOperation::Correlation,
            second_column: Some(second.into()),
        });
        self
    }

    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_by.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn top_k(mut self, k: u64) -> Self {
        self.top_k = Some(k);
        self
    }

    /// SHA-256 over the canonical JSON form, for log correlation
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        format!("{:x}", hasher.finalize())
    }
}

/// One `(column, operation)` pair of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub column: String,
    pub operation: AnalysisOperation,

    /// Second column for `correlation`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_column: Option<String>,
}

impl OperationSpec {
    pub fn new(column: impl Into<String>, operation: AnalysisOperation) -> Self {
        Self {
            column: column.into(),
            operation,
            second_column: None,
        }
    }
}

/// Comparison operators accepted in filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Between,
    Like,
}

impl FilterOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Ge => ">=",
            FilterOperator::Le => "<=",
            FilterOperator::Between => "BETWEEN",
            FilterOperator::Like => "LIKE",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl TryFrom<String> for FilterOperator {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(FilterOperator::Eq),
            "!=" | "<>" => Ok(FilterOperator::Ne),
            ">" => Ok(FilterOperator::Gt),
            "<" => Ok(FilterOperator::Lt),
            ">=" => Ok(FilterOperator::Ge),
            "<=" => Ok(FilterOperator::Le),
            "BETWEEN" => Ok(FilterOperator::Between),
            "LIKE" => Ok(FilterOperator::Like),
            _ => Err(format!("Unsupported filter operator: {}", value)),
        }
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_sql().to_string()
    }
}

/// Scalar literal used in filters and bound as a statement parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int(v.into())
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Text(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Text(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<ScalarValue>),
    Scalar(ScalarValue),
}

/// `<column> <operator> <value>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub column: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<ScalarValue>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: FilterValue::Scalar(value.into()),
        }
    }

    pub fn equals(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::new(column, FilterOperator::Eq, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::new(column, FilterOperator::Gt, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::new(column, FilterOperator::Lt, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, FilterOperator::Like, ScalarValue::Text(pattern.into()))
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<ScalarValue>,
        high: impl Into<ScalarValue>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: FilterOperator::Between,
            value: FilterValue::List(vec![low.into(), high.into()]),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// A complete statement compiled from an [`AnalysisRequest`]
///
/// `sql` carries `?` placeholders bound to `params` in order; `preview` is the
/// same statement with literals inlined, for display only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<ScalarValue>,
    pub preview: String,
    pub request: AnalysisRequest,
}

/// Success envelope for an executed analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub sql_preview: String,
}
