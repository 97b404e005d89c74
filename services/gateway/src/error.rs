//! Error taxonomy for the gateway and its mapping onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Errors raised by a key-value backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors surfaced by request handlers
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request was well-formed JSON but failed a shape or format check
    #[error("{0}")]
    Validation(String),

    #[error("Not Found")]
    NotFound,

    /// The request body was not valid JSON at all
    #[error("{0}")]
    MalformedBody(serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::MalformedBody(_)
            | GatewayError::Store(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            metrics::counter!("gateway_request_errors_total").increment(1);
            error!(error = %message, "Request failed");
        } else if status != StatusCode::NOT_FOUND {
            warn!(error = %message, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
