//! Shared application state

use std::sync::{Arc, Mutex};

use quack_duck::DuckExecutor;
use quack_registry::CapabilityRegistry;
use tracing::info_span;
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    /// Only used to clone per-request connections
    executor: Arc<Mutex<DuckExecutor>>,
    pub registry: Arc<CapabilityRegistry>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(executor: DuckExecutor) -> Result<Self, prometheus::Error> {
        Ok(Self {
            executor: Arc::new(Mutex::new(executor)),
            registry: Arc::new(CapabilityRegistry::new()),
            metrics: Arc::new(Metrics::new()?),
        })
    }

    /// Run `work` on its own connection on the blocking pool
    pub async fn run_blocking<T, F>(&self, operation: &'static str, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&DuckExecutor) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let executor = {
            let shared = self
                .executor
                .lock()
                .map_err(|_| ApiError::Internal("executor lock poisoned".to_string()))?;
            shared.try_clone()?
        };

        let span = info_span!("request", request_id = %Uuid::new_v4(), operation);
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            work(&executor)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {}", e)))?
    }
}
