//! API error type and HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quack_duck::{AnalysisError, ExecutionError};
use quack_ir::ErrorKind;
use quack_registry::SchemaError;
use quack_sql::CompileError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Analysis(e) => match e.kind() {
                ErrorKind::Schema => StatusCode::NOT_FOUND,
                ErrorKind::Execution => StatusCode::UNPROCESSABLE_ENTITY,
                kind if kind.is_client_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, also used as the metrics outcome label
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Analysis(e) => e.kind().as_str(),
            ApiError::BadRequest(_) => ErrorKind::InvalidRequest.as_str(),
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<CompileError> for ApiError {
    fn from(err: CompileError) -> Self {
        ApiError::Analysis(err.into())
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        ApiError::Analysis(err.into())
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        ApiError::Analysis(err.into())
    }
}
