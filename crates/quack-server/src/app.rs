//! Axum application setup

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/tables", get(handlers::list_tables))
        .route("/tables/:table/schema", get(handlers::table_schema))
        .route("/tables/:table/options", get(handlers::column_options))
        .route("/tables/:table/columns/:column/examples", get(handlers::column_examples))
        .route("/tables/:table/quick", get(handlers::quick_analysis))
        .route("/tables/:table/sample", get(handlers::sample_rows))
        .route("/analyze", post(handlers::analyze))
        .route("/query/custom", post(handlers::custom_query))
        .route("/query/explain", post(handlers::explain));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .nest("/api", api_routes)
        .with_state(state)
}
