//! Client-visible error envelope.
//!
//! # Responsibilities
//! - Represent every failure the proxy itself generates
//! - Serialize the uniform JSON error document
//!
//! # Design Decisions
//! - Lower components return structured `ResponseError` values; only
//!   the handler layer turns them into HTTP responses
//! - Upstream error bodies are never leaked to clients

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// A failure that will be serialized to the client.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ResponseError {
    /// HTTP status to answer with.
    pub status: StatusCode,
    /// Dotted machine-readable code, e.g. `error.badGateway`.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Overrides `application/json` when set.
    pub content_type: Option<String>,
}

impl ResponseError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            content_type: None,
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "error.notFound", "Not found")
    }

    pub fn request_too_large() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "error.requestTooLarge",
            "Request too large",
        )
    }

    pub fn uri_too_long() -> Self {
        Self::new(
            StatusCode::URI_TOO_LONG,
            "error.requestURITooLong",
            "The requested URI is too long for a GET, please use POSTs",
        )
    }

    pub fn missing_parameter(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "error.missingParameter", message)
    }

    pub fn authentication_error(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "error.authenticationError",
            message,
        )
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "error.badGateway", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "error.internalServerError",
            message,
        )
    }
}

/// Wire shape of the error document.
#[derive(Serialize)]
struct JsonError<'a> {
    error: bool,
    status: u16,
    code: &'a str,
    message: &'a str,
    data: serde_json::Map<String, serde_json::Value>,
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        let body = serde_json::to_vec(&JsonError {
            error: true,
            status: self.status.as_u16(),
            code: self.code,
            message: &self.message,
            data: serde_json::Map::new(),
        })
        .unwrap_or_default();

        let content_type = self
            .content_type
            .unwrap_or_else(|| "application/json".to_string());

        Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}
