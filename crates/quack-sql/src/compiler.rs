//! Request validation and statement assembly

use quack_ir::{AnalysisOperation, AnalysisRequest, Category, CompiledQuery, OperationSpec};
use quack_registry::{default_operation, require, CapabilityRegistry, ColumnDescriptor, TableSchema};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clause::{self, ident, Aggregate, GroupKey, SelectFragment, DEFAULT_TOP_K};
use crate::CompileError;

/// A compiled sample statement for one operation on one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisExample {
    pub operation: AnalysisOperation,
    pub description: String,
    pub sql: String,
}

struct OperationPlan {
    operation: AnalysisOperation,
    fragment: SelectFragment,
    guards: Vec<String>,
}

/// Compiles requests against one table schema
///
/// Holds no state beyond the schema, so identical requests always compile to
/// identical statements.
pub struct QueryCompiler<'a> {
    schema: &'a TableSchema,
    default_top_k: u64,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(schema: &'a TableSchema) -> Self {
        Self {
            schema,
            default_top_k: DEFAULT_TOP_K,
        }
    }

    /// Row count for `top_k` when the request leaves it unset
    pub fn with_default_top_k(mut self, k: u64) -> Self {
        self.default_top_k = k;
        self
    }

    pub fn schema(&self) -> &TableSchema {
        self.schema
    }

    pub fn compile(&self, request: &AnalysisRequest) -> Result<CompiledQuery, CompileError> {
        self.validate(request)?;

        let standalone = request.operations.len() == 1;
        let plans = request
            .operations
            .iter()
            .map(|spec| self.plan(spec, standalone))
            .collect::<Result<Vec<_>, _>>()?;

        let mut keys: Vec<GroupKey> = request.group_by.iter().map(|c| GroupKey::column(c)).collect();
        for key in shared_keys(&plans)? {
            if !keys.iter().any(|k| k.expr == key.expr) {
                keys.push(key.clone());
            }
        }

        let aggregates = merge_aggregates(&plans);
        let fragment = SelectFragment { keys, aggregates };
        unique_outputs(&fragment)?;

        let mut conditions = clause::build_where(&request.filters)?;
        let mut guarded: Vec<&String> = Vec::new();
        for guard in plans.iter().flat_map(|p| &p.guards) {
            if !guarded.contains(&guard) {
                guarded.push(guard);
                conditions.push_guard(guard.clone());
            }
        }

        let lead = plans[0].operation;
        let top_k = request
            .top_k
            .or_else(|| lead.flags().uses_top_k.then_some(self.default_top_k));

        let select = format!("SELECT {}", fragment.render());
        let from = format!("FROM {}", ident(&self.schema.name));
        let group_by = clause::build_group_by(&fragment.keys.iter().map(|k| k.expr.clone()).collect::<Vec<_>>());
        let order_by = clause::build_order_by(lead, &request.sort_by);
        let limit = clause::build_limit(request.limit, lead, top_k);

        let assemble = |where_clause: String| {
            [
                select.as_str(),
                from.as_str(),
                where_clause.as_str(),
                group_by.as_str(),
                order_by.as_str(),
                limit.as_str(),
            ]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
        };
        let sql = assemble(conditions.sql());
        let preview = assemble(conditions.preview());

        debug!(
            table = %self.schema.name,
            fingerprint = %request.fingerprint(),
            sql = %preview,
            "compiled analysis"
        );

        Ok(CompiledQuery {
            sql,
            params: conditions.params,
            preview,
            request: request.clone(),
        })
    }

    /// Preview SQL for every operation available on `column`
    pub fn examples_for_column(
        &self,
        registry: &CapabilityRegistry,
        column: &str,
    ) -> Result<Vec<AnalysisExample>, CompileError> {
        let descriptor = self.column(column)?;
        let mut examples = Vec::new();

        for &operation in registry.column_operations(descriptor) {
            let request = AnalysisRequest::new(self.schema.name.clone());
            let request = if operation == AnalysisOperation::Correlation {
                let Some(partner) = self
                    .schema
                    .columns_in(Category::Numeric)
                    .find(|c| c.name != descriptor.name)
                else {
                    continue;
                };
                request.correlation(&descriptor.name, &partner.name)
            } else {
                request.operation(&descriptor.name, operation)
            };

            examples.push(AnalysisExample {
                operation,
                description: registry.describe(operation),
                sql: self.compile(&request)?.preview,
            });
        }

        Ok(examples)
    }

    fn column(&self, name: &str) -> Result<&'a ColumnDescriptor, CompileError> {
        self.schema.column(name).ok_or_else(|| CompileError::UnknownColumn {
            column: name.to_string(),
            table: self.schema.name.clone(),
        })
    }

    fn validate(&self, request: &AnalysisRequest) -> Result<(), CompileError> {
        if request.operations.is_empty() {
            return Err(CompileError::InvalidRequest(
                "at least one operation is required".to_string(),
            ));
        }
        if request.table != self.schema.name {
            return Err(CompileError::InvalidRequest(format!(
                "request targets table '{}' but the schema describes '{}'",
                request.table, self.schema.name
            )));
        }
        if request.limit == Some(0) {
            return Err(CompileError::InvalidRequest("limit must be positive".to_string()));
        }
        if request.top_k == Some(0) {
            return Err(CompileError::InvalidRequest("top_k must be positive".to_string()));
        }

        for column in &request.group_by {
            self.column(column)?;
        }
        for filter in &request.filters {
            self.column(&filter.column)?;
        }
        Ok(())
    }

    fn plan(&self, spec: &OperationSpec, standalone: bool) -> Result<OperationPlan, CompileError> {
        let column = self.column(&spec.column)?;
        require(column, spec.operation)?;

        match (spec.operation, &spec.second_column) {
            (AnalysisOperation::Correlation, Some(second)) => {
                let partner = self.column(second)?;
                require(partner, AnalysisOperation::Correlation)?;

                let guards = if standalone {
                    vec![not_null(&column.name), not_null(&partner.name)]
                } else {
                    Vec::new()
                };
                Ok(OperationPlan {
                    operation: spec.operation,
                    fragment: clause::build_correlation(&column.name, &partner.name),
                    guards,
                })
            }
            (AnalysisOperation::Correlation, None) => Err(CompileError::InvalidRequest(
                "correlation requires a second_column".to_string(),
            )),
            (operation, Some(_)) => Err(CompileError::InvalidRequest(format!(
                "second_column is only valid for correlation, not '{}'",
                operation
            ))),
            (operation, None) => {
                let guards = if operation.is_grouping() {
                    vec![not_null(&column.name)]
                } else {
                    Vec::new()
                };
                Ok(OperationPlan {
                    operation,
                    fragment: clause::select_fragment(&column.name, operation)?,
                    guards,
                })
            }
        }
    }
}

fn not_null(column: &str) -> String {
    format!("{} IS NOT NULL", ident(column))
}

/// Grouping keys common to every operation of a composite request
fn shared_keys(plans: &[OperationPlan]) -> Result<&[GroupKey], CompileError> {
    let first = &plans[0];
    for plan in &plans[1..] {
        if plan.fragment.keys != first.fragment.keys {
            return Err(CompileError::IncompatibleComposition(format!(
                "'{}' and '{}' produce differently grouped rows",
                first.operation, plan.operation
            )));
        }
    }
    Ok(&first.fragment.keys)
}

/// Aggregates of every operation in request order
///
/// Identical aggregates are kept once. Aggregates from different columns that
/// would share an output name are renamed `<name>_<column>`.
fn merge_aggregates(plans: &[OperationPlan]) -> Vec<Aggregate> {
    let mut merged: Vec<Aggregate> = Vec::new();
    for aggregate in plans.iter().flat_map(|p| &p.fragment.aggregates) {
        if !merged.iter().any(|a| a.expr == aggregate.expr && a.name == aggregate.name) {
            merged.push(aggregate.clone());
        }
    }

    let clashing: Vec<String> = merged
        .iter()
        .filter(|a| merged.iter().filter(|b| b.name == a.name).count() > 1)
        .map(|a| a.name.clone())
        .collect();

    merged
        .into_iter()
        .map(|a| if clashing.contains(&a.name) { a.qualified() } else { a })
        .collect()
}

/// Every output column of the statement must have its own name
fn unique_outputs(fragment: &SelectFragment) -> Result<(), CompileError> {
    let mut seen: Vec<&str> = Vec::new();
    for name in fragment.output_names() {
        if seen.contains(&name) {
            return Err(CompileError::IncompatibleComposition(format!(
                "output column '{}' would appear more than once",
                name
            )));
        }
        seen.push(name);
    }
    Ok(())
}

/// One-shot overview: the default analysis of every numeric column
pub fn quick_request(schema: &TableSchema) -> Option<AnalysisRequest> {
    let operation = default_operation(Category::Numeric);
    let mut numeric = schema.columns_in(Category::Numeric).peekable();
    numeric.peek()?;

    Some(numeric.fold(AnalysisRequest::new(schema.name.clone()), |request, column| {
        request.operation(&column.name, operation)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quack_ir::{ErrorKind, FilterCondition, ScalarValue, SortDirection};
    use quack_registry::supports;

    fn schema() -> TableSchema {
        TableSchema::from_columns(
            "t",
            [
                ("id", "INTEGER"),
                ("category", "VARCHAR"),
                ("amount", "DOUBLE"),
                ("region", "VARCHAR"),
                ("age", "INTEGER"),
                ("created", "TIMESTAMP"),
                ("price", "DECIMAL(10,2)"),
                ("rating", "DOUBLE"),
                ("payload", "JSON"),
            ],
        )
    }

    #[test]
    fn test_grouped_average() {
        let schema = schema();
        let request = AnalysisRequest::new("t")
            .operation("amount", AnalysisOperation::Avg)
            .group_by("category");

        let compiled = QueryCompiler::new(&schema).compile(&request).unwrap();
        assert_eq!(
            compiled.preview,
            "SELECT category, AVG(amount) as avg_amount FROM t GROUP BY category"
        );
        assert_eq!(compiled.sql, compiled.preview);
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_compile_is_deterministic() {
        let schema = schema();
        let compiler = QueryCompiler::new(&schema);
        let request = AnalysisRequest::new("t")
            .operation("region", AnalysisOperation::TopK)
            .filter(FilterCondition::between("age", 20, 40))
            .top_k(5);

        let a = compiler.compile(&request).unwrap();
        let b = QueryCompiler::new(&schema).compile(&request.clone()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_capability_gating() {
        let schema = schema();
        let compiler = QueryCompiler::new(&schema);
        let columns = [
            ("amount", Category::Numeric),
            ("region", Category::Text),
            ("created", Category::Temporal),
            ("payload", Category::Other),
        ];

        for (column, category) in columns {
            for op in AnalysisOperation::ALL {
                let request = if op == AnalysisOperation::Correlation {
                    AnalysisRequest::new("t").correlation(column, "rating")
                } else {
                    AnalysisRequest::new("t").operation(column, op)
                };

                match compiler.compile(&request) {
                    Ok(_) => assert!(supports(category, op), "{op} compiled on {category}"),
                    Err(e) => {
                        assert!(!supports(category, op), "{op} rejected on {category}: {e}");
                        assert_eq!(e.kind(), ErrorKind::UnsupportedAnalysis);
                    }
                }
            }
        }
    }

    #[test]
    fn test_top_k_limit_precedence() {
        let schema = schema();
        let compiler = QueryCompiler::new(&schema);
        let base = AnalysisRequest::new("t").operation("region", AnalysisOperation::TopK);

        let explicit = compiler.compile(&base.clone().top_k(7).limit(3)).unwrap();
        assert!(explicit.preview.ends_with("ORDER BY count DESC LIMIT 3"));

        let top_k = compiler.compile(&base.clone().top_k(7)).unwrap();
        assert!(top_k.preview.ends_with("LIMIT 7"));

        let default = compiler.compile(&base.clone()).unwrap();
        assert!(default.preview.ends_with("LIMIT 10"));

        let configured = QueryCompiler::new(&schema).with_default_top_k(25).compile(&base).unwrap();
        assert!(configured.preview.ends_with("LIMIT 25"));
    }

    #[test]
    fn test_null_guard_after_filters() {
        let schema = schema();
        let request = AnalysisRequest::new("t")
            .operation("region", AnalysisOperation::ValueDistribution)
            .filter(FilterCondition::gt("age", 30));

        let compiled = QueryCompiler::new(&schema).compile(&request).unwrap();
        assert_eq!(
            compiled.preview,
            "SELECT region, COUNT(*) as count FROM t WHERE age > 30 AND region IS NOT NULL \
             GROUP BY region ORDER BY count DESC"
        );
        assert_eq!(
            compiled.sql,
            "SELECT region, COUNT(*) as count FROM t WHERE age > ? AND region IS NOT NULL \
             GROUP BY region ORDER BY count DESC"
        );
        assert_eq!(compiled.params, vec![ScalarValue::Int(30)]);
    }

    #[test]
    fn test_grouping_keys_match_select() {
        let schema = schema();
        let compiler = QueryCompiler::new(&schema);

        for op in AnalysisOperation::ALL.into_iter().filter(|op| op.is_grouping()) {
            let column = if op.is_temporal_bucket() { "created" } else { "region" };
            let fragment = clause::select_fragment(column, op).unwrap();
            let compiled = compiler
                .compile(&AnalysisRequest::new("t").operation(column, op).group_by("category"))
                .unwrap();

            let key = &fragment.keys[0];
            assert!(
                compiled.preview.starts_with(&format!("SELECT category, {}, COUNT(*)", key.render())),
                "{op}: {}",
                compiled.preview
            );
            assert!(
                compiled.preview.contains(&format!("GROUP BY category, {} ORDER BY", key.expr)),
                "{op}: {}",
                compiled.preview
            );
        }
    }

    #[test]
    fn test_correlation() {
        let schema = schema();
        let compiled = QueryCompiler::new(&schema)
            .compile(&AnalysisRequest::new("t").correlation("price", "rating"))
            .unwrap();

        assert_eq!(
            compiled.preview,
            "SELECT CORR(price, rating) as correlation FROM t \
             WHERE price IS NOT NULL AND rating IS NOT NULL"
        );
    }

    #[test]
    fn test_correlation_requires_numeric_partner() {
        let schema = schema();
        let compiler = QueryCompiler::new(&schema);

        let text_partner = compiler.compile(&AnalysisRequest::new("t").correlation("price", "region"));
        assert_eq!(text_partner.unwrap_err().kind(), ErrorKind::UnsupportedAnalysis);

        let missing = compiler.compile(&AnalysisRequest::new("t").operation("price", AnalysisOperation::Correlation));
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_multi_operation_scalar() {
        let schema = schema();
        let request = AnalysisRequest::new("t")
            .operation("age", AnalysisOperation::Avg)
            .operation("amount", AnalysisOperation::Sum)
            .operation("rating", AnalysisOperation::Max)
            .filter(FilterCondition::between("age", 25, 35))
            .group_by("category");

        let compiled = QueryCompiler::new(&schema).compile(&request).unwrap();
        assert_eq!(
            compiled.preview,
            "SELECT category, AVG(age) as avg_age, SUM(amount) as sum_amount, MAX(rating) as max_rating \
             FROM t WHERE age BETWEEN 25 AND 35 GROUP BY category"
        );
        assert_eq!(compiled.params, vec![ScalarValue::Int(25), ScalarValue::Int(35)]);
    }

    #[test]
    fn test_multi_operation_shared_keys() {
        let schema = schema();
        let request = AnalysisRequest::new("t")
            .operation("region", AnalysisOperation::TopK)
            .operation("region", AnalysisOperation::ValueDistribution);

        let compiled = QueryCompiler::new(&schema).compile(&request).unwrap();
        assert_eq!(
            compiled.preview,
            "SELECT region, COUNT(*) as count FROM t WHERE region IS NOT NULL \
             GROUP BY region ORDER BY count DESC LIMIT 10"
        );
    }

    #[test]
    fn test_incompatible_composition() {
        let schema = schema();
        let compiler = QueryCompiler::new(&schema);

        let mixed = AnalysisRequest::new("t")
            .operation("amount", AnalysisOperation::Avg)
            .operation("region", AnalysisOperation::TopK);
        assert_eq!(compiler.compile(&mixed).unwrap_err().kind(), ErrorKind::IncompatibleComposition);

        let different_keys = AnalysisRequest::new("t")
            .operation("region", AnalysisOperation::TopK)
            .operation("created", AnalysisOperation::YearAnalysis);
        assert_eq!(
            compiler.compile(&different_keys).unwrap_err().kind(),
            ErrorKind::IncompatibleComposition
        );
    }

    #[test]
    fn test_composed_fixed_names_are_qualified() {
        let schema = TableSchema::from_columns(
            "t",
            [("a", "VARCHAR"), ("b", "INTEGER"), ("d1", "DATE"), ("d2", "TIMESTAMP")],
        );
        let compiler = QueryCompiler::new(&schema);

        let missing = AnalysisRequest::new("t")
            .operation("a", AnalysisOperation::MissingValues)
            .operation("b", AnalysisOperation::MissingValues);
        assert_eq!(
            compiler.compile(&missing).unwrap().preview,
            "SELECT COUNT(*) as total_count, \
             COUNT(a) as non_null_count_a, COUNT(*) - COUNT(a) as null_count_a, \
             COUNT(b) as non_null_count_b, COUNT(*) - COUNT(b) as null_count_b FROM t"
        );

        let ranges = AnalysisRequest::new("t")
            .operation("d1", AnalysisOperation::DateRange)
            .operation("d2", AnalysisOperation::DateRange);
        assert_eq!(
            compiler.compile(&ranges).unwrap().preview,
            "SELECT MIN(d1) as min_date_d1, MAX(d1) as max_date_d1, \
             MIN(d2) as min_date_d2, MAX(d2) as max_date_d2 FROM t"
        );

        let single = AnalysisRequest::new("t").operation("d1", AnalysisOperation::DateRange);
        assert_eq!(
            compiler.compile(&single).unwrap().preview,
            "SELECT MIN(d1) as min_date, MAX(d1) as max_date FROM t"
        );
    }

    #[test]
    fn test_composed_correlations_are_qualified() {
        let schema = schema();
        let request = AnalysisRequest::new("t")
            .correlation("price", "rating")
            .correlation("price", "amount");

        let compiled = QueryCompiler::new(&schema).compile(&request).unwrap();
        assert_eq!(
            compiled.preview,
            "SELECT CORR(price, rating) as correlation_price_rating, \
             CORR(price, amount) as correlation_price_amount FROM t"
        );
    }

    #[test]
    fn test_derived_key_cannot_shadow_group_by_column() {
        let schema = TableSchema::from_columns("t", [("year", "INTEGER"), ("created", "TIMESTAMP")]);
        let request = AnalysisRequest::new("t")
            .operation("created", AnalysisOperation::YearAnalysis)
            .group_by("year");

        let err = QueryCompiler::new(&schema).compile(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleComposition);
        assert!(err.to_string().contains("'year'"));
    }

    #[test]
    fn test_temporal_operations_follow_column_type() {
        let schema = TableSchema::from_columns("t", [("opens", "TIME"), ("born", "DATE")]);
        let compiler = QueryCompiler::new(&schema);

        let year_of_time = AnalysisRequest::new("t").operation("opens", AnalysisOperation::YearAnalysis);
        assert_eq!(compiler.compile(&year_of_time).unwrap_err().kind(), ErrorKind::UnsupportedAnalysis);

        let hour_of_date = AnalysisRequest::new("t").operation("born", AnalysisOperation::HourAnalysis);
        assert_eq!(compiler.compile(&hour_of_date).unwrap_err().kind(), ErrorKind::UnsupportedAnalysis);

        let registry = CapabilityRegistry::new();
        let examples = compiler.examples_for_column(&registry, "opens").unwrap();
        assert!(examples.iter().all(|e| e.operation != AnalysisOperation::YearAnalysis));
        assert!(examples.iter().any(|e| e.operation == AnalysisOperation::HourAnalysis));
    }

    #[test]
    fn test_request_validation() {
        let schema = schema();
        let compiler = QueryCompiler::new(&schema);

        let empty = AnalysisRequest::new("t");
        assert_eq!(compiler.compile(&empty).unwrap_err().kind(), ErrorKind::InvalidRequest);

        let wrong_table = AnalysisRequest::new("other").operation("amount", AnalysisOperation::Avg);
        assert_eq!(compiler.compile(&wrong_table).unwrap_err().kind(), ErrorKind::InvalidRequest);

        let zero_limit = AnalysisRequest::new("t")
            .operation("amount", AnalysisOperation::Avg)
            .limit(0);
        assert_eq!(compiler.compile(&zero_limit).unwrap_err().kind(), ErrorKind::InvalidRequest);

        let unknown = AnalysisRequest::new("t").operation("nope", AnalysisOperation::Avg);
        assert_eq!(
            compiler.compile(&unknown).unwrap_err(),
            CompileError::UnknownColumn {
                column: "nope".into(),
                table: "t".into()
            }
        );

        let unknown_filter = AnalysisRequest::new("t")
            .operation("amount", AnalysisOperation::Avg)
            .filter(FilterCondition::equals("nope", 1));
        assert_eq!(compiler.compile(&unknown_filter).unwrap_err().kind(), ErrorKind::UnknownColumn);
    }

    #[test]
    fn test_explicit_sort_and_quoted_identifiers() {
        let schema = TableSchema::from_columns("order items", [("unit price", "DOUBLE"), ("group", "VARCHAR")]);
        let request = AnalysisRequest::new("order items")
            .operation("unit price", AnalysisOperation::Avg)
            .group_by("group")
            .sort_by("avg_unit price", SortDirection::Desc)
            .limit(5);

        let compiled = QueryCompiler::new(&schema).compile(&request).unwrap();
        assert_eq!(
            compiled.preview,
            "SELECT \"group\", AVG(\"unit price\") as \"avg_unit price\" FROM \"order items\" \
             GROUP BY \"group\" ORDER BY \"avg_unit price\" DESC LIMIT 5"
        );
    }

    #[test]
    fn test_filter_values_are_bound() {
        let schema = schema();
        let request = AnalysisRequest::new("t")
            .operation("amount", AnalysisOperation::Sum)
            .filter(FilterCondition::equals("region", "x' OR '1'='1"));

        let compiled = QueryCompiler::new(&schema).compile(&request).unwrap();
        assert_eq!(compiled.sql, "SELECT SUM(amount) as sum_amount FROM t WHERE region = ?");
        assert_eq!(compiled.params, vec![ScalarValue::Text("x' OR '1'='1".into())]);
        assert!(compiled.preview.ends_with("WHERE region = 'x'' OR ''1''=''1'"));
    }

    #[test]
    fn test_examples_for_column() {
        let schema = schema();
        let registry = CapabilityRegistry::new();
        let compiler = QueryCompiler::new(&schema);

        let examples = compiler.examples_for_column(&registry, "price").unwrap();
        assert_eq!(examples.len(), registry.available_operations(Category::Numeric).len());
        assert_eq!(examples[1].operation, AnalysisOperation::Avg);
        assert_eq!(examples[1].sql, "SELECT AVG(price) as avg_price FROM t");

        let corr = examples.last().unwrap();
        assert_eq!(corr.operation, AnalysisOperation::Correlation);
        assert!(corr.sql.starts_with("SELECT CORR(price, id) as correlation"));

        assert!(compiler.examples_for_column(&registry, "nope").is_err());
    }

    #[test]
    fn test_quick_request() {
        let schema = schema();
        let request = quick_request(&schema).unwrap();
        let columns: Vec<_> = request.operations.iter().map(|o| o.column.as_str()).collect();
        assert_eq!(columns, vec!["id", "amount", "age", "price", "rating"]);
        assert!(QueryCompiler::new(&schema).compile(&request).is_ok());

        let no_numbers = TableSchema::from_columns("t", [("name", "VARCHAR")]);
        assert!(quick_request(&no_numbers).is_none());
    }
}
