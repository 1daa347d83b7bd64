//! QuackView HTTP server
//!
//! Serves structured analyses over a DuckDB database: column options per
//! table, compiled examples, analysis execution and custom SQL.

use quack_duck::{DuckExecutor, ExecutionBudget};
use tracing::info;

mod app;
mod config;
mod error;
mod handlers;
mod logging;
mod metrics;
mod state;

use config::Config;
use state::AppState;

fn open_executor(config: &Config) -> Result<DuckExecutor, quack_duck::ExecutionError> {
    let executor = match (&config.database.path, config.database.read_only) {
        (Some(path), true) => DuckExecutor::open_read_only(path)?,
        (Some(path), false) => DuckExecutor::open(path)?,
        (None, _) => DuckExecutor::new()?,
    };

    Ok(executor
        .with_budget(ExecutionBudget {
            max_rows: config.analysis.max_rows,
        })
        .with_default_top_k(config.analysis.default_top_k))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("QUACKVIEW_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path)?;
    config.apply_logging_env();
    logging::init();

    let executor = open_executor(&config)?;
    info!(
        database = config.database.path.as_deref().unwrap_or(":memory:"),
        read_only = config.database.read_only,
        "database opened"
    );

    let app = app::create_router(AppState::new(executor)?);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting QuackView server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
