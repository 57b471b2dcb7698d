//! Unified application error model.
//! One enum shared by the shard service (HTTP responses) and the fan-out
//! coordinator (per-partition failures), with a helper mapper to HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("bad_request: {message}")]
    UserInput { message: String },
    #[error("partition {partition}: transport: {message}")]
    Transport { partition: usize, message: String },
    #[error("partition {partition}: invalid json: {message}")]
    Decode { partition: usize, message: String },
    #[error("partition {partition}: shard error: {message}")]
    Shard { partition: usize, message: String },
    #[error("io: {message}")]
    Io { message: String },
    #[error("internal: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn user<S: Into<String>>(msg: S) -> Self { AppError::UserInput { message: msg.into() } }
    pub fn transport<S: Into<String>>(partition: usize, msg: S) -> Self {
        AppError::Transport { partition, message: msg.into() }
    }
    pub fn decode<S: Into<String>>(partition: usize, msg: S) -> Self {
        AppError::Decode { partition, message: msg.into() }
    }
    pub fn shard<S: Into<String>>(partition: usize, msg: S) -> Self {
        AppError::Shard { partition, message: msg.into() }
    }
    pub fn io<S: Into<String>>(msg: S) -> Self { AppError::Io { message: msg.into() } }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal { message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Transport { .. } => 502,
            AppError::Decode { .. } => 502,
            AppError::Shard { .. } => 502,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    /// Partition index for per-shard failures, if this error carries one.
    pub fn partition(&self) -> Option<usize> {
        match self {
            AppError::Transport { partition, .. }
            | AppError::Decode { partition, .. }
            | AppError::Shard { partition, .. } => Some(*partition),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "status": "error", "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
