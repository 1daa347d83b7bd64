//! End-to-end analyses against in-memory DuckDB tables

use quack_duck::{AnalysisError, DuckExecutor};
use quack_ir::{AnalysisOperation, AnalysisRequest, ErrorKind, FilterCondition, SortDirection};
use serde_json::json;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn executor() -> Result<DuckExecutor, Box<dyn std::error::Error>> {
    let executor = DuckExecutor::new()?;
    executor.connection().execute_batch(
        "CREATE TABLE t (id INTEGER, category VARCHAR, amount DECIMAL(10,2));
         INSERT INTO t VALUES (1, 'A', 10), (2, 'A', 20), (3, 'B', 5);

         CREATE TABLE products (name VARCHAR, region VARCHAR, price DOUBLE, rating DOUBLE, age INTEGER, sold_at TIMESTAMP);
         INSERT INTO products VALUES
            ('widget', 'north', 10.0, 3.0, 25, TIMESTAMP '2023-01-15 09:30:00'),
            ('gadget', 'north', 20.0, 3.5, 35, TIMESTAMP '2023-07-02 14:00:00'),
            ('doohickey', 'south', 30.0, 4.5, 45, TIMESTAMP '2024-03-10 09:45:00'),
            ('gizmo', NULL, 40.0, 4.0, 55, TIMESTAMP '2024-12-24 18:15:00'),
            ('thing', 'east', 50.0, 5.0, 33, NULL),
            ('whatsit', 'north', 60.0, 4.8, 29, TIMESTAMP '2024-06-01 09:00:00');",
    )?;
    Ok(executor)
}

#[test]
fn grouped_average_round_trip() -> TestResult {
    let executor = executor()?;
    let request = AnalysisRequest::new("t")
        .operation("amount", AnalysisOperation::Avg)
        .group_by("category")
        .sort_by("category", SortDirection::Asc);

    let result = executor.run_analysis(&request)?;
    assert_eq!(result.columns, vec!["category", "avg_amount"]);
    assert_eq!(result.rows, vec![vec![json!("A"), json!(15.0)], vec![json!("B"), json!(5.0)]]);
    assert_eq!(
        result.sql_preview,
        "SELECT category, AVG(amount) as avg_amount FROM t GROUP BY category ORDER BY category ASC"
    );
    Ok(())
}

#[test]
fn sums_are_numbers() -> TestResult {
    let executor = executor()?;

    let ids = executor.run_analysis(&AnalysisRequest::new("t").operation("id", AnalysisOperation::Sum))?;
    assert_eq!(ids.rows, vec![vec![json!(6)]]);

    let amounts = executor.run_analysis(&AnalysisRequest::new("t").operation("amount", AnalysisOperation::Sum))?;
    assert_eq!(amounts.rows, vec![vec![json!(35.0)]]);
    Ok(())
}

#[test]
fn correlation_is_bounded() -> TestResult {
    let executor = executor()?;
    let result = executor.run_analysis(&AnalysisRequest::new("products").correlation("price", "rating"))?;

    assert_eq!(result.columns, vec!["correlation"]);
    let corr = result.rows[0][0].as_f64().ok_or("correlation is not a number")?;
    assert!((-1.0..=1.0).contains(&corr));
    assert!(corr > 0.0);
    Ok(())
}

#[test]
fn top_k_respects_limit_precedence() -> TestResult {
    let executor = executor()?;
    let base = AnalysisRequest::new("products").operation("region", AnalysisOperation::TopK);

    let limited = executor.run_analysis(&base.clone().top_k(3).limit(1))?;
    assert_eq!(limited.rows, vec![vec![json!("north"), json!(3)]]);

    let top_two = executor.run_analysis(&base.top_k(2))?;
    assert_eq!(top_two.rows.len(), 2);
    assert_eq!(top_two.rows[0], vec![json!("north"), json!(3)]);
    Ok(())
}

#[test]
fn grouping_excludes_nulls() -> TestResult {
    let executor = executor()?;
    let request = AnalysisRequest::new("products")
        .operation("region", AnalysisOperation::ValueDistribution)
        .filter(FilterCondition::gt("age", 30));

    let result = executor.run_analysis(&request)?;
    assert!(result.rows.iter().all(|row| !row[0].is_null()));
    assert!(result
        .sql_preview
        .contains("WHERE age > 30 AND region IS NOT NULL"));

    let total: i64 = result.rows.iter().filter_map(|row| row[1].as_i64()).sum();
    assert_eq!(total, 3);
    Ok(())
}

#[test]
fn temporal_buckets() -> TestResult {
    let executor = executor()?;

    let years = executor.run_analysis(
        &AnalysisRequest::new("products")
            .operation("sold_at", AnalysisOperation::YearAnalysis)
            .sort_by("year", SortDirection::Asc),
    )?;
    assert_eq!(years.columns, vec!["year", "count"]);
    assert_eq!(years.rows, vec![vec![json!(2023), json!(2)], vec![json!(2024), json!(3)]]);

    let range = executor.run_analysis(
        &AnalysisRequest::new("products").operation("sold_at", AnalysisOperation::DateRange),
    )?;
    assert_eq!(range.rows[0], vec![json!("2023-01-15T09:30:00"), json!("2024-12-24T18:15:00")]);

    let seasons = executor.run_analysis(
        &AnalysisRequest::new("products").operation("sold_at", AnalysisOperation::SeasonalAnalysis),
    )?;
    assert_eq!(seasons.rows.len(), 3);
    Ok(())
}

#[test]
fn interval_range_is_iso_duration() -> TestResult {
    let executor = executor()?;
    executor.connection().execute_batch(
        "CREATE TABLE waits (dur INTERVAL);
         INSERT INTO waits VALUES (INTERVAL '1 day'), (INTERVAL '2 hours'), (INTERVAL '3 months'), (NULL);",
    )?;

    let range = executor.run_analysis(&AnalysisRequest::new("waits").operation("dur", AnalysisOperation::DateRange))?;
    assert_eq!(range.columns, vec!["min_date", "max_date"]);
    assert_eq!(range.rows, vec![vec![json!("PT2H"), json!("P3M")]]);

    let seasons = executor
        .run_analysis(&AnalysisRequest::new("waits").operation("dur", AnalysisOperation::SeasonalAnalysis))
        .unwrap_err();
    assert_eq!(seasons.kind(), ErrorKind::UnsupportedAnalysis);
    Ok(())
}

#[test]
fn nested_values_convert_to_json() -> TestResult {
    let executor = executor()?;
    executor.connection().execute_batch(
        "CREATE TYPE mood AS ENUM ('sad', 'happy');
         CREATE TABLE diary (feeling mood, tags VARCHAR[], spot STRUCT(x INTEGER, label VARCHAR));
         INSERT INTO diary VALUES ('happy', ['a', 'b'], {'x': 1, 'label': 'home'});",
    )?;

    let result = executor.sample_rows("diary", 1)?;
    assert_eq!(
        result.rows,
        vec![vec![json!("happy"), json!(["a", "b"]), json!({"x": 1, "label": "home"})]]
    );
    Ok(())
}

#[test]
fn bound_filters_with_quotes() -> TestResult {
    let executor = executor()?;
    let request = AnalysisRequest::new("products")
        .operation("price", AnalysisOperation::Count)
        .filter(FilterCondition::equals("name", "o'clock"))
        .filter(FilterCondition::between("age", 20, 40));

    let result = executor.run_analysis(&request)?;
    assert_eq!(result.rows, vec![vec![json!(0)]]);
    assert!(result.sql_preview.contains("name = 'o''clock'"));
    Ok(())
}

#[test]
fn data_quality_and_missing_values() -> TestResult {
    let executor = executor()?;

    let missing = executor.run_analysis(
        &AnalysisRequest::new("products").operation("region", AnalysisOperation::MissingValues),
    )?;
    assert_eq!(missing.columns, vec!["total_count", "non_null_count", "null_count"]);
    assert_eq!(missing.rows[0], vec![json!(6), json!(5), json!(1)]);

    let quality = executor.run_analysis(
        &AnalysisRequest::new("products").operation("region", AnalysisOperation::DataQuality),
    )?;
    assert_eq!(quality.rows[0][3], json!(3));
    Ok(())
}

#[test]
fn quick_analysis_averages_numeric_columns() -> TestResult {
    let executor = executor()?;
    let result = executor.quick_analysis("products")?;
    assert_eq!(result.columns, vec!["avg_price", "avg_rating", "avg_age"]);
    assert_eq!(result.rows[0][0], json!(35.0));
    Ok(())
}

#[test]
fn pattern_analysis_buckets_values() -> TestResult {
    let executor = executor()?;
    let result = executor.run_analysis(
        &AnalysisRequest::new("products").operation("name", AnalysisOperation::PatternAnalysis),
    )?;
    assert_eq!(result.rows, vec![vec![json!("alphabetic"), json!(6)]]);
    Ok(())
}

#[test]
fn execution_errors_carry_engine_message() -> TestResult {
    let executor = executor()?;
    let request = AnalysisRequest::new("products")
        .operation("price", AnalysisOperation::Sum)
        .filter(FilterCondition::gt("age", "not a number"));

    let err = executor.run_analysis(&request).unwrap_err();
    assert!(matches!(err, AnalysisError::Execution(_)));
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().starts_with("Database error:"));
    Ok(())
}

#[test]
fn unsupported_analysis_is_rejected_before_execution() -> TestResult {
    let executor = executor()?;
    let err = executor
        .run_analysis(&AnalysisRequest::new("products").operation("region", AnalysisOperation::Avg))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedAnalysis);
    Ok(())
}
