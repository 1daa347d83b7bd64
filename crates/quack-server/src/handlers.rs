//! API request handlers

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use quack_duck::QueryResult;
use quack_ir::{AnalysisRequest, AnalysisResult};
use quack_registry::{ColumnOptions, TableSchema};
use quack_sql::{AnalysisExample, QueryCompiler};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::Level;

use crate::error::ApiError;
use crate::log_event;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CustomQuery {
    pub sql: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub plan: String,
}

#[derive(Debug, Deserialize)]
pub struct SampleParams {
    #[serde(default = "default_sample_size")]
    pub limit: u64,
}

fn default_sample_size() -> u64 {
    10
}

fn require_sql(query: CustomQuery) -> Result<String, ApiError> {
    let sql = query.sql.trim().to_string();
    if sql.is_empty() {
        return Err(ApiError::BadRequest("sql must not be empty".to_string()));
    }
    Ok(sql)
}

/// Count and time an analysis
fn record<T>(state: &AppState, started: Instant, result: &Result<T, ApiError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    state.metrics.observe(outcome, started.elapsed().as_secs_f64());
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_tables(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let tables = state
        .run_blocking("list_tables", |executor| Ok(executor.schema_provider().list_tables()?))
        .await?;
    Ok(Json(tables))
}

pub async fn table_schema(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<TableSchema>, ApiError> {
    let schema = state
        .run_blocking("table_schema", move |executor| Ok(executor.table_schema(&table)?))
        .await?;
    Ok(Json(schema))
}

pub async fn column_options(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Vec<ColumnOptions>>, ApiError> {
    let registry = state.registry.clone();
    let options = state
        .run_blocking("column_options", move |executor| {
            let schema = executor.table_schema(&table)?;
            Ok(registry.column_options(&schema))
        })
        .await?;
    Ok(Json(options))
}

pub async fn column_examples(
    State(state): State<AppState>,
    Path((table, column)): Path<(String, String)>,
) -> Result<Json<Vec<AnalysisExample>>, ApiError> {
    let registry = state.registry.clone();
    let examples = state
        .run_blocking("column_examples", move |executor| {
            let schema = executor.table_schema(&table)?;
            Ok(QueryCompiler::new(&schema).examples_for_column(&registry, &column)?)
        })
        .await?;
    Ok(Json(examples))
}

/// Body of `POST /api/analyze`; every parse failure becomes an [`ApiError`]
fn analysis_request(payload: Result<Json<Value>, JsonRejection>) -> Result<AnalysisRequest, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    Ok(quack_sql::parse_request(body)?)
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let started = Instant::now();
    let request = analysis_request(payload);
    if request.is_err() {
        record(&state, started, &request);
    }
    let request = request?;
    let table = request.table.clone();

    let result = state
        .run_blocking("analyze", move |executor| Ok(executor.run_analysis(&request)?))
        .await;
    record(&state, started, &result);

    let result = result?;
    log_event!(
        level: Level::INFO,
        event: "analysis_completed",
        table: table,
        rows: result.rows.len(),
        elapsed_ms: started.elapsed().as_millis()
    );
    Ok(Json(result))
}

pub async fn quick_analysis(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let started = Instant::now();
    let result = state
        .run_blocking("quick_analysis", move |executor| Ok(executor.quick_analysis(&table)?))
        .await;
    record(&state, started, &result);
    Ok(Json(result?))
}

pub async fn custom_query(
    State(state): State<AppState>,
    Json(query): Json<CustomQuery>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let sql = require_sql(query)?;
    let result = state
        .run_blocking("custom_query", move |executor| {
            let result = executor.execute_sql(&sql)?;
            Ok(result.into_analysis_result(sql))
        })
        .await?;
    Ok(Json(result))
}

pub async fn explain(
    State(state): State<AppState>,
    Json(query): Json<CustomQuery>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let sql = require_sql(query)?;
    let plan = state
        .run_blocking("explain", move |executor| Ok(executor.explain(&sql)?))
        .await?;
    Ok(Json(ExplainResponse { plan }))
}

pub async fn sample_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<SampleParams>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let result = state
        .run_blocking("sample_rows", move |executor| {
            executor.table_schema(&table)?;
            let preview = format!("SELECT * FROM {} LIMIT {}", quack_sql::clause::ident(&table), params.limit);
            let rows: QueryResult = executor.sample_rows(&table, params.limit)?;
            Ok(rows.into_analysis_result(preview))
        })
        .await?;
    Ok(Json(result))
}

pub async fn metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(e.to_string()))
}
