use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::generator::GenerateError;
use crate::request::ValidationError;
use crate::store::StoreError;

use super::models::ErrorBody;

pub const USAGE: &str = "/api/og?id={id}&title={title}&desc={description}";

pub mod messages {
    pub const GENERATE_FAILED: &str = "Failed to generate Open Graph image";
    pub const CACHE_FAILED: &str = "Failed to manage cache";
    pub const INVALID_PARAMETER: &str = "Invalid request parameter";
    pub const MISSING_ID: &str = "Missing required parameter: id";
    pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";
    pub const NOT_FOUND: &str = "Preview not found";
}

/// An error rendered as a JSON body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                usage: None,
                message: None,
            },
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.body.message = Some(message.into());
        self
    }

    fn with_usage(mut self) -> Self {
        self.body.usage = Some(USAGE.to_string());
        self
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, messages::NOT_FOUND)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, messages::METHOD_NOT_ALLOWED)
    }

    /// Rejects a request parameter on the cache endpoint.
    pub fn invalid(err: &ValidationError) -> Self {
        match err {
            ValidationError::MissingId => Self::bad_request(messages::MISSING_ID),
            other => {
                Self::bad_request(messages::INVALID_PARAMETER).with_message(other.to_string())
            }
        }
    }

    /// Maps a generation failure on `/api/og`.
    pub fn generate(err: GenerateError) -> Self {
        match err {
            GenerateError::Validation(
                err @ (ValidationError::MissingId | ValidationError::MissingTitle),
            ) => Self::bad_request(err.to_string()).with_usage(),
            GenerateError::Validation(err) => Self::invalid(&err),
            GenerateError::Timeout(_) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, messages::GENERATE_FAILED)
                    .with_message(err.to_string())
            }
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, messages::GENERATE_FAILED)
                .with_message(other.to_string()),
        }
    }

    pub fn cache(err: StoreError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, messages::CACHE_FAILED)
            .with_message(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                status = self.status.as_u16(),
                error = %self.body.error,
                message = self.body.message.as_deref().unwrap_or_default(),
                "request failed"
            );
        }
        (self.status, Json(self.body)).into_response()
    }
}
