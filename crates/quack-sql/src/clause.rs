//! SQL clause rendering
//!
//! Every function here is pure and returns an empty string when its clause does
//! not apply. Column names reach the SQL text only through [`ident`].

use quack_ir::{AnalysisOperation, FilterCondition, FilterOperator, FilterValue, ScalarValue, SortKey};

use crate::CompileError;

/// `top_k` when the caller gives neither `limit` nor `top_k`
pub const DEFAULT_TOP_K: u64 = 10;

const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "between",
    "both", "case", "cast", "check", "collate", "column", "constraint", "create", "default",
    "deferrable", "desc", "distinct", "do", "else", "end", "except", "false", "fetch", "for",
    "foreign", "from", "grant", "group", "having", "in", "initially", "intersect", "into",
    "is", "join", "lateral", "leading", "like", "limit", "not", "null", "offset", "on",
    "only", "or", "order", "pivot", "placing", "primary", "qualify", "references",
    "returning", "select", "some", "symmetric", "table", "then", "to", "trailing", "true",
    "union", "unique", "unpivot", "using", "variadic", "when", "where", "window", "with",
];

fn is_simple_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_WORDS.contains(&name.to_ascii_lowercase().as_str())
}

/// Render an identifier, double-quoting it unless it is a plain name
pub fn ident(name: &str) -> String {
    if is_simple_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Inline a literal for the display preview
pub fn literal(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Bool(true) => "TRUE".to_string(),
        ScalarValue::Bool(false) => "FALSE".to_string(),
        ScalarValue::Int(i) => i.to_string(),
        ScalarValue::Float(f) => f.to_string(),
        ScalarValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn prefixed(prefix: &str, column: &str) -> String {
    format!("{}_{}", prefix, column)
}

/// A grouping key: expression plus the output column it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    pub expr: String,
    /// Output column name, unquoted
    pub name: String,
    derived: bool,
}

impl GroupKey {
    pub fn column(column: &str) -> Self {
        Self {
            expr: ident(column),
            name: column.to_string(),
            derived: false,
        }
    }

    fn derived(expr: String, name: &str) -> Self {
        Self {
            expr,
            name: name.to_string(),
            derived: true,
        }
    }

    pub fn render(&self) -> String {
        if self.derived {
            format!("{} as {}", self.expr, ident(&self.name))
        } else {
            self.expr.clone()
        }
    }
}

/// An aggregate expression and the output column it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub expr: String,
    /// Output column name, unquoted
    pub name: String,
    /// Appended to `name` when another column's aggregate claims the same name
    pub qualifier: String,
}

impl Aggregate {
    fn new(expr: String, name: impl Into<String>, qualifier: &str) -> Self {
        Self {
            expr,
            name: name.into(),
            qualifier: qualifier.to_string(),
        }
    }

    /// Same aggregate, renamed to `<name>_<qualifier>`
    pub fn qualified(&self) -> Self {
        Self {
            name: prefixed(&self.name, &self.qualifier),
            ..self.clone()
        }
    }

    pub fn render(&self) -> String {
        format!("{} as {}", self.expr, ident(&self.name))
    }
}

/// The SELECT-list contribution of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectFragment {
    /// Keys the operation groups by on its own
    pub keys: Vec<GroupKey>,
    pub aggregates: Vec<Aggregate>,
}

impl SelectFragment {
    fn scalar(aggregates: Vec<Aggregate>) -> Self {
        Self {
            keys: Vec::new(),
            aggregates,
        }
    }

    fn counted(key: GroupKey, column: &str) -> Self {
        Self {
            keys: vec![key],
            aggregates: vec![Aggregate::new("COUNT(*)".to_string(), "count", column)],
        }
    }

    /// Output column names in SELECT order
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .map(|k| k.name.as_str())
            .chain(self.aggregates.iter().map(|a| a.name.as_str()))
    }

    pub fn render(&self) -> String {
        self.keys
            .iter()
            .map(GroupKey::render)
            .chain(self.aggregates.iter().map(Aggregate::render))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn percentile(fraction: &str, col: &str) -> String {
    format!("PERCENTILE_CONT({}) WITHIN GROUP (ORDER BY {})", fraction, col)
}

fn pattern_case(col: &str) -> String {
    format!(
        "CASE WHEN regexp_full_match({c}, '[0-9]+') THEN 'numeric' \
         WHEN regexp_full_match({c}, '[A-Za-z]+') THEN 'alphabetic' \
         WHEN regexp_full_match({c}, '[A-Za-z0-9]+') THEN 'alphanumeric' \
         WHEN {c} LIKE '%@%.%' THEN 'email_like' \
         WHEN TRIM({c}) = '' THEN 'blank' \
         ELSE 'mixed' END",
        c = col
    )
}

fn season_case(col: &str) -> String {
    format!(
        "CASE WHEN EXTRACT(MONTH FROM {c}) IN (12, 1, 2) THEN 'winter' \
         WHEN EXTRACT(MONTH FROM {c}) IN (3, 4, 5) THEN 'spring' \
         WHEN EXTRACT(MONTH FROM {c}) IN (6, 7, 8) THEN 'summer' \
         ELSE 'autumn' END",
        c = col
    )
}

/// Structured template for `operation` over `column`
pub fn select_fragment(column: &str, operation: AnalysisOperation) -> Result<SelectFragment, CompileError> {
    use AnalysisOperation::*;

    let c = ident(column);
    // Aggregate named after the column, e.g. `avg_amount`
    let own = |expr: String, prefix: &str| Aggregate::new(expr, prefixed(prefix, column), column);
    // Aggregate with a fixed name, qualified only on collision
    let fixed = |expr: String, name: &str| Aggregate::new(expr, name, column);
    let bucket = |expr: String, name: &str| SelectFragment::counted(GroupKey::derived(expr, name), column);

    let fragment = match operation {
        Sum => SelectFragment::scalar(vec![own(format!("SUM({})", c), "sum")]),
        Avg => SelectFragment::scalar(vec![own(format!("AVG({})", c), "avg")]),
        Max => SelectFragment::scalar(vec![own(format!("MAX({})", c), "max")]),
        Min => SelectFragment::scalar(vec![own(format!("MIN({})", c), "min")]),
        Count => SelectFragment::scalar(vec![own(format!("COUNT({})", c), "count")]),
        Variance => SelectFragment::scalar(vec![own(format!("VAR_POP({})", c), "var_pop")]),
        Stddev => SelectFragment::scalar(vec![own(format!("STDDEV_POP({})", c), "stddev_pop")]),
        Median => SelectFragment::scalar(vec![own(percentile("0.5", &c), "median")]),
        Quartiles => SelectFragment::scalar(vec![
            own(percentile("0.25", &c), "q1"),
            own(percentile("0.5", &c), "q2"),
            own(percentile("0.75", &c), "q3"),
        ]),
        Percentiles => SelectFragment::scalar(
            [("0.1", "p10"), ("0.25", "p25"), ("0.5", "p50"), ("0.75", "p75"), ("0.9", "p90")]
                .iter()
                .map(|(fraction, prefix)| own(percentile(fraction, &c), prefix))
                .collect(),
        ),
        DistinctCount => SelectFragment::scalar(vec![own(format!("COUNT(DISTINCT {})", c), "distinct_count")]),
        TopK | ValueDistribution => SelectFragment::counted(GroupKey::column(column), column),
        LengthAnalysis => bucket(format!("LENGTH({})", c), "length"),
        PatternAnalysis => bucket(pattern_case(&c), "pattern"),
        DateRange => SelectFragment::scalar(vec![
            fixed(format!("MIN({})", c), "min_date"),
            fixed(format!("MAX({})", c), "max_date"),
        ]),
        YearAnalysis => bucket(format!("EXTRACT(YEAR FROM {})", c), "year"),
        MonthAnalysis => bucket(format!("EXTRACT(MONTH FROM {})", c), "month"),
        DayAnalysis => bucket(format!("EXTRACT(DAY FROM {})", c), "day"),
        HourAnalysis => bucket(format!("EXTRACT(HOUR FROM {})", c), "hour"),
        WeekdayAnalysis => bucket(format!("EXTRACT(DOW FROM {})", c), "weekday"),
        SeasonalAnalysis => bucket(season_case(&c), "season"),
        MissingValues => SelectFragment::scalar(vec![
            fixed("COUNT(*)".to_string(), "total_count"),
            fixed(format!("COUNT({})", c), "non_null_count"),
            fixed(format!("COUNT(*) - COUNT({})", c), "null_count"),
        ]),
        DataQuality => SelectFragment::scalar(vec![
            fixed("COUNT(*)".to_string(), "total_count"),
            fixed(format!("COUNT({})", c), "non_null_count"),
            fixed(format!("COUNT(*) - COUNT({})", c), "null_count"),
            fixed(format!("COUNT(DISTINCT {})", c), "distinct_count"),
            fixed(
                format!("ROUND(100.0 * COUNT({}) / NULLIF(COUNT(*), 0), 2)", c),
                "completeness_pct",
            ),
        ]),
        Correlation => return Err(CompileError::UnsupportedOperation(operation)),
    };
    Ok(fragment)
}

/// SELECT list for a single-column operation
pub fn build_select(column: &str, operation: AnalysisOperation) -> Result<String, CompileError> {
    select_fragment(column, operation).map(|f| f.render())
}

pub fn build_correlation(column: &str, second: &str) -> SelectFragment {
    SelectFragment::scalar(vec![Aggregate::new(
        format!("CORR({}, {})", ident(column), ident(second)),
        "correlation",
        &prefixed(column, second),
    )])
}

/// Conjunction of WHERE predicates in both executable and preview form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    sql: Vec<String>,
    preview: Vec<String>,
    pub params: Vec<ScalarValue>,
}

impl Conditions {
    /// Append a predicate with no bound values
    pub fn push_guard(&mut self, predicate: String) {
        self.preview.push(predicate.clone());
        self.sql.push(predicate);
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn sql(&self) -> String {
        render_where(&self.sql)
    }

    pub fn preview(&self) -> String {
        render_where(&self.preview)
    }
}

fn render_where(predicates: &[String]) -> String {
    if predicates.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", predicates.join(" AND "))
    }
}

fn invalid(filter: &FilterCondition, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidFilter {
        column: filter.column.clone(),
        reason: reason.into(),
    }
}

/// WHERE predicates for the caller's filters, in request order
pub fn build_where(filters: &[FilterCondition]) -> Result<Conditions, CompileError> {
    let mut conditions = Conditions::default();

    for filter in filters {
        let col = ident(&filter.column);
        match (filter.operator, &filter.value) {
            (FilterOperator::Between, FilterValue::List(bounds)) => {
                let [low, high] = bounds.as_slice() else {
                    return Err(invalid(
                        filter,
                        format!("BETWEEN takes exactly two values, got {}", bounds.len()),
                    ));
                };
                conditions.sql.push(format!("{} BETWEEN ? AND ?", col));
                conditions
                    .preview
                    .push(format!("{} BETWEEN {} AND {}", col, literal(low), literal(high)));
                conditions.params.extend([low.clone(), high.clone()]);
            }
            (FilterOperator::Between, FilterValue::Scalar(_)) => {
                return Err(invalid(filter, "BETWEEN takes a [low, high] pair"));
            }
            (op, FilterValue::List(_)) => {
                return Err(invalid(filter, format!("{} takes a single value", op)));
            }
            (FilterOperator::Like, FilterValue::Scalar(value)) if !matches!(value, ScalarValue::Text(_)) => {
                return Err(invalid(filter, "LIKE takes a string pattern"));
            }
            (op, FilterValue::Scalar(value)) => {
                conditions.sql.push(format!("{} {} ?", col, op.as_sql()));
                conditions
                    .preview
                    .push(format!("{} {} {}", col, op.as_sql(), literal(value)));
                conditions.params.push(value.clone());
            }
        }
    }

    Ok(conditions)
}

pub fn build_group_by(keys: &[String]) -> String {
    if keys.is_empty() {
        String::new()
    } else {
        format!("GROUP BY {}", keys.join(", "))
    }
}

pub fn build_order_by(operation: AnalysisOperation, sort_by: &[SortKey]) -> String {
    if !sort_by.is_empty() {
        let keys: Vec<String> = sort_by
            .iter()
            .map(|k| format!("{} {}", ident(&k.field), k.direction.as_sql()))
            .collect();
        format!("ORDER BY {}", keys.join(", "))
    } else if operation.is_grouping() {
        "ORDER BY count DESC".to_string()
    } else {
        String::new()
    }
}

/// Explicit limit, then `top_k`, then nothing
pub fn build_limit(limit: Option<u64>, operation: AnalysisOperation, top_k: Option<u64>) -> String {
    let effective = match (limit, top_k) {
        (Some(limit), _) => Some(limit),
        (None, k) if operation.flags().uses_top_k => Some(k.unwrap_or(DEFAULT_TOP_K)),
        (None, Some(k)) if operation.is_grouping() => Some(k),
        _ => None,
    };

    effective
        .map(|n| format!("LIMIT {}", n))
        .unwrap_or_default()
}
