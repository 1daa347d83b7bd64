//! Capability registry: which analyses apply to which column categories

use quack_ir::{AnalysisOperation, Category};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

mod classify;
mod schema;

pub use classify::{classify, temporal_kind, TemporalKind};
pub use schema::{ColumnDescriptor, SchemaError, SchemaProvider, StaticSchemaProvider, TableSchema};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Analysis '{operation}' is not available for {category} column '{column}'")]
    Unsupported {
        column: String,
        category: Category,
        operation: AnalysisOperation,
    },
}

const NUMERIC_OPERATIONS: &[AnalysisOperation] = &[
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
    AnalysisOperation::MissingValues,
    AnalysisOperation::DataQuality,
    AnalysisOperation::Correlation,
];

const TEXT_OPERATIONS: &[AnalysisOperation] = &[
    AnalysisOperation::Count,
    AnalysisOperation::DistinctCount,
    AnalysisOperation::TopK,
    AnalysisOperation::ValueDistribution,
    AnalysisOperation::LengthAnalysis,
    AnalysisOperation::PatternAnalysis,
    AnalysisOperation::MissingValues,
    AnalysisOperation::DataQuality,
];

const TEMPORAL_OPERATIONS: &[AnalysisOperation] = &[
    AnalysisOperation::Count,
    AnalysisOperation::DateRange,
    AnalysisOperation::YearAnalysis,
    AnalysisOperation::MonthAnalysis,
    AnalysisOperation::DayAnalysis,
    AnalysisOperation::HourAnalysis,
    AnalysisOperation::WeekdayAnalysis,
    AnalysisOperation::SeasonalAnalysis,
    AnalysisOperation::MissingValues,
    AnalysisOperation::DataQuality,
];

const DATE_OPERATIONS: &[AnalysisOperation] = &[
    AnalysisOperation::Count,
    AnalysisOperation::DateRange,
    AnalysisOperation::YearAnalysis,
    AnalysisOperation::MonthAnalysis,
    AnalysisOperation::DayAnalysis,
    AnalysisOperation::WeekdayAnalysis,
    AnalysisOperation::SeasonalAnalysis,
    AnalysisOperation::MissingValues,
    AnalysisOperation::DataQuality,
];

const TIME_OPERATIONS: &[AnalysisOperation] = &[
    AnalysisOperation::Count,
    AnalysisOperation::DateRange,
    AnalysisOperation::HourAnalysis,
    AnalysisOperation::MissingValues,
    AnalysisOperation::DataQuality,
];

const INTERVAL_OPERATIONS: &[AnalysisOperation] = &[
    AnalysisOperation::Count,
    AnalysisOperation::DateRange,
    AnalysisOperation::MissingValues,
    AnalysisOperation::DataQuality,
];

const OTHER_OPERATIONS: &[AnalysisOperation] = &[
    AnalysisOperation::Count,
    AnalysisOperation::MissingValues,
    AnalysisOperation::DataQuality,
];

/// Operations valid for a category, in presentation order
pub fn available_operations(category: Category) -> &'static [AnalysisOperation] {
    match category {
        Category::Numeric => NUMERIC_OPERATIONS,
        Category::Text => TEXT_OPERATIONS,
        Category::Temporal => TEMPORAL_OPERATIONS,
        Category::Other => OTHER_OPERATIONS,
    }
}

/// Operations valid for one column
///
/// Temporal columns are narrowed by what their type carries: dates have no
/// hour, times have no calendar part and intervals are not points in time.
pub fn column_operations(column: &ColumnDescriptor) -> &'static [AnalysisOperation] {
    match temporal_kind(&column.raw_type) {
        Some(TemporalKind::Date) => DATE_OPERATIONS,
        Some(TemporalKind::Time) => TIME_OPERATIONS,
        Some(TemporalKind::Interval) => INTERVAL_OPERATIONS,
        Some(TemporalKind::Timestamp) | None => available_operations(column.category),
    }
}

pub fn default_operation(category: Category) -> AnalysisOperation {
    match category {
        Category::Numeric => AnalysisOperation::Avg,
        Category::Text | Category::Temporal | Category::Other => AnalysisOperation::Count,
    }
}

pub fn supports(category: Category, operation: AnalysisOperation) -> bool {
    available_operations(category).contains(&operation)
}

/// Check that `operation` may run on `column`
pub fn require(column: &ColumnDescriptor, operation: AnalysisOperation) -> Result<(), RegistryError> {
    if column_operations(column).contains(&operation) {
        Ok(())
    } else {
        Err(RegistryError::Unsupported {
            column: column.name.clone(),
            category: column.category,
            operation,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOption {
    pub name: AnalysisOperation,
    pub description: String,
}

/// What can be asked about one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOptions {
    pub column: String,
    pub raw_type: String,
    pub category: Category,
    pub default_operation: AnalysisOperation,
    pub operations: Vec<OperationOption>,
}

/// Capability lookups plus human-readable operation descriptions
pub struct CapabilityRegistry {
    descriptions: HashMap<AnalysisOperation, String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            descriptions: HashMap::new(),
        };
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        for (operation, text) in [
            (AnalysisOperation::Sum, "Total of all values"),
            (AnalysisOperation::Avg, "Average value"),
            (AnalysisOperation::Max, "Largest value"),
            (AnalysisOperation::Min, "Smallest value"),
            (AnalysisOperation::Count, "Number of non-null values"),
            (AnalysisOperation::Variance, "Population variance"),
            (AnalysisOperation::Stddev, "Population standard deviation"),
            (AnalysisOperation::Median, "Median (50th percentile)"),
            (AnalysisOperation::Quartiles, "First, second and third quartiles"),
            (AnalysisOperation::Percentiles, "10th, 25th, 50th, 75th and 90th percentiles"),
            (AnalysisOperation::DistinctCount, "Number of distinct values"),
            (AnalysisOperation::TopK, "Most frequent values"),
            (AnalysisOperation::ValueDistribution, "Frequency of every value"),
            (AnalysisOperation::LengthAnalysis, "Distribution of value lengths"),
            (AnalysisOperation::PatternAnalysis, "Distribution of value shapes (numeric, alphabetic, email-like)"),
            (AnalysisOperation::DateRange, "Earliest and latest timestamp"),
            (AnalysisOperation::YearAnalysis, "Row count per year"),
            (AnalysisOperation::MonthAnalysis, "Row count per month"),
            (AnalysisOperation::DayAnalysis, "Row count per day of month"),
            (AnalysisOperation::HourAnalysis, "Row count per hour of day"),
            (AnalysisOperation::WeekdayAnalysis, "Row count per day of week"),
            (AnalysisOperation::SeasonalAnalysis, "Row count per season"),
            (AnalysisOperation::MissingValues, "Null and non-null counts"),
            (AnalysisOperation::DataQuality, "Completeness and cardinality summary"),
            (AnalysisOperation::Correlation, "Pearson correlation with a second numeric column"),
        ] {
            self.register_description(operation, text);
        }
    }

    /// Replace the description of an operation (e.g. for localization)
    pub fn register_description(&mut self, operation: AnalysisOperation, text: impl Into<String>) {
        self.descriptions.insert(operation, text.into());
    }

    pub fn describe(&self, operation: AnalysisOperation) -> String {
        match self.descriptions.get(&operation) {
            Some(text) => text.clone(),
            None => {
                debug_assert!(false, "missing description for {}", operation);
                format!("{} analysis", operation)
            }
        }
    }

    pub fn available_operations(&self, category: Category) -> &'static [AnalysisOperation] {
        available_operations(category)
    }

    pub fn column_operations(&self, column: &ColumnDescriptor) -> &'static [AnalysisOperation] {
        column_operations(column)
    }

    pub fn default_operation(&self, category: Category) -> AnalysisOperation {
        default_operation(category)
    }

    pub fn require(
        &self,
        column: &ColumnDescriptor,
        operation: AnalysisOperation,
    ) -> Result<(), RegistryError> {
        require(column, operation)
    }

    pub fn column_options(&self, schema: &TableSchema) -> Vec<ColumnOptions> {
        schema
            .columns
            .iter()
            .map(|column| ColumnOptions {
                column: column.name.clone(),
                raw_type: column.raw_type.clone(),
                category: column.category,
                default_operation: default_operation(column.category),
                operations: column_operations(column)
                    .iter()
                    .map(|&name| OperationOption {
                        name,
                        description: self.describe(name),
                    })
                    .collect(),
            })
            .collect()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
