//! Type system for QuackView analyses

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Semantic category of a column, derived from its storage type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Numeric,
    Text,
    Temporal,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Numeric,
        Category::Text,
        Category::Temporal,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Numeric => "NUMERIC",
            Category::Text => "TEXT",
            Category::Temporal => "TEMPORAL",
            Category::Other => "OTHER",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported analysis type: {0}")]
pub struct UnknownOperation(pub String);

/// Closed set of analysis operations
///
/// Names are matched case-insensitively when parsed, and serialize in
/// snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum AnalysisOperation {
    // Numeric
    Sum,
    Avg,
    Max,
    Min,
    Count,
    Variance,
    Stddev,
    Median,
    Quartiles,
    Percentiles,

    // Text
    DistinctCount,
    TopK,
    ValueDistribution,
    LengthAnalysis,
    PatternAnalysis,

    // Temporal
    DateRange,
    YearAnalysis,
    MonthAnalysis,
    DayAnalysis,
    HourAnalysis,
    WeekdayAnalysis,
    SeasonalAnalysis,

    // Any category
    MissingValues,
    DataQuality,

    // Two numeric columns
    Correlation,
}

/// Shape flags for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationFlags {
    /// Groups by its own column (or a bucketing expression over it)
    pub requires_group_by_own_column: bool,
    /// Limited by `top_k` when no explicit limit is given
    pub uses_top_k: bool,
    /// Produces one row of aggregates
    pub is_aggregate_scalar: bool,
}

impl AnalysisOperation {
    pub const ALL: [AnalysisOperation; 25] = [
        AnalysisOperation::Sum,
        AnalysisOperation::Avg,
        AnalysisOperation::Max,
        AnalysisOperation::Min,
        AnalysisOperation::Count,
        AnalysisOperation::Variance,
        AnalysisOperation::Stddev,
        AnalysisOperation::Median,
        AnalysisOperation::Quartiles,
        AnalysisOperation::Percentiles,
        AnalysisOperation::DistinctCount,
        AnalysisOperation::TopK,
        AnalysisOperation::ValueDistribution,
        AnalysisOperation::LengthAnalysis,
        AnalysisOperation::PatternAnalysis,
        AnalysisOperation::DateRange,
        AnalysisOperation::YearAnalysis,
        AnalysisOperation::MonthAnalysis,
        AnalysisOperation::DayAnalysis,
        AnalysisOperation::HourAnalysis,
        AnalysisOperation::WeekdayAnalysis,
        AnalysisOperation::SeasonalAnalysis,
        AnalysisOperation::MissingValues,
        AnalysisOperation::DataQuality,
        AnalysisOperation::Correlation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisOperation::Sum => "sum",
            AnalysisOperation::Avg => "avg",
            AnalysisOperation::Max => "max",
            AnalysisOperation::Min => "min",
            AnalysisOperation::Count => "count",
            AnalysisOperation::Variance => "variance",
            AnalysisOperation::Stddev => "stddev",
            AnalysisOperation::Median => "median",
            AnalysisOperation::Quartiles => "quartiles",
            AnalysisOperation::Percentiles => "percentiles",
            AnalysisOperation::DistinctCount => "distinct_count",
            AnalysisOperation::TopK => "top_k",
            AnalysisOperation::ValueDistribution => "value_distribution",
            AnalysisOperation::LengthAnalysis => "length_analysis",
            AnalysisOperation::PatternAnalysis => "pattern_analysis",
            AnalysisOperation::DateRange => "date_range",
            AnalysisOperation::YearAnalysis => "year_analysis",
            AnalysisOperation::MonthAnalysis => "month_analysis",
            AnalysisOperation::DayAnalysis => "day_analysis",
            AnalysisOperation::HourAnalysis => "hour_analysis",
            AnalysisOperation::WeekdayAnalysis => "weekday_analysis",
            AnalysisOperation::SeasonalAnalysis => "seasonal_analysis",
            AnalysisOperation::MissingValues => "missing_values",
            AnalysisOperation::DataQuality => "data_quality",
            AnalysisOperation::Correlation => "correlation",
        }
    }

    pub fn flags(&self) -> OperationFlags {
        let grouping = self.is_grouping();
        OperationFlags {
            requires_group_by_own_column: grouping,
            uses_top_k: matches!(self, AnalysisOperation::TopK),
            is_aggregate_scalar: !grouping,
        }
    }

    /// Operations whose result is one row per bucket of their own column
    pub fn is_grouping(&self) -> bool {
        matches!(
            self,
            AnalysisOperation::TopK
                | AnalysisOperation::ValueDistribution
                | AnalysisOperation::LengthAnalysis
                | AnalysisOperation::PatternAnalysis
        ) || self.is_temporal_bucket()
    }

    pub fn is_temporal_bucket(&self) -> bool {
        matches!(
            self,
            AnalysisOperation::YearAnalysis
                | AnalysisOperation::MonthAnalysis
                | AnalysisOperation::DayAnalysis
                | AnalysisOperation::HourAnalysis
                | AnalysisOperation::WeekdayAnalysis
                | AnalysisOperation::SeasonalAnalysis
        )
    }
}

impl fmt::Display for AnalysisOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnalysisOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let op = match normalized.as_str() {
            "var_pop" => AnalysisOperation::Variance,
            "stddev_pop" => AnalysisOperation::Stddev,
            "count_distinct" => AnalysisOperation::DistinctCount,
            other => AnalysisOperation::ALL
                .into_iter()
                .find(|op| op.name() == other)
                .ok_or_else(|| UnknownOperation(s.to_string()))?,
        };
        Ok(op)
    }
}

impl TryFrom<String> for AnalysisOperation {
    type Error = UnknownOperation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Stable, machine-readable error kind surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedAnalysis,
    UnsupportedOperation,
    IncompatibleComposition,
    InvalidFilter,
    UnknownColumn,
    InvalidRequest,
    Schema,
    Execution,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedAnalysis => "unsupported_analysis",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::IncompatibleComposition => "incompatible_composition",
            ErrorKind::InvalidFilter => "invalid_filter",
            ErrorKind::UnknownColumn => "unknown_column",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Schema => "schema",
            ErrorKind::Execution => "execution",
        }
    }

    /// Whether the caller's input caused the error
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ErrorKind::Execution | ErrorKind::Schema)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
