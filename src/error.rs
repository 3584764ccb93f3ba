use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use thiserror::Error;

use crate::models::evaluate::ErrorResponse;

/// Message returned when an error renders to an empty string.
const FALLBACK_MESSAGE: &str = "Analysis failed";

/// The main error type for the relay, covering both the inbound request and the upstream call.
#[derive(Debug, Error)]
pub enum Error {
    /// The inbound request used a method other than `POST` or `OPTIONS`.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The inbound request lacked an image or a fixture type.
    #[error("Missing image or fixture type")]
    MissingFields,

    /// No upstream API key was configured for the process.
    #[error("API key not configured")]
    MissingApiKey,

    /// An API key was configured but the client could not be built from it.
    #[error("Messages API client unavailable: {0}")]
    ClientUnavailable(String),

    /// The upstream API answered with a non-success status.
    #[error("{0}")]
    UpstreamError(String),

    /// Error indicating an unexpected response format from the API.
    #[error("Unexpected response format: {0}")]
    ResponseFormatError(String),

    /// HTTP request-related error, mapped directly from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization or deserialization error, mapped directly from `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error, such as missing or invalid configuration values.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// HTTP status the handler answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::MissingFields => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the JSON body sent to the caller.
    pub fn to_response(&self) -> ErrorResponse {
        let message = self.to_string();
        ErrorResponse {
            error: if message.is_empty() {
                FALLBACK_MESSAGE.to_owned()
            } else {
                message
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            let source = std::error::Error::source(&self).map(ToString::to_string);
            tracing::error!(error = %self, details = ?self, source = ?source, "evaluation failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "evaluation rejected");
        }
        (status, Json(self.to_response())).into_response()
    }
}

/// Error body returned by the upstream API on failure.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorJsonResponse {
    /// Error detail, absent on bodies that do not follow the usual shape.
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

/// Type and message of an upstream error.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorDetail {
    /// Error category, e.g. `rate_limit_error`.
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    /// Human readable message.
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorJsonResponse {
    /// The upstream message, if the body carried a non-empty one.
    pub fn message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|detail| detail.message.as_deref())
            .filter(|message| !message.is_empty())
    }
}
