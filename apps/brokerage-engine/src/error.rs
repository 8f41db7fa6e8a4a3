//! Error handling for the brokerage engine.
//!
//! Every failure surfaced to a caller carries a stable, machine-checkable
//! [`ErrorCode`] plus a human-readable message and optional key/value context.
//!
//! # HTTP Status Codes
//!
//! | Code | HTTP | Usage |
//! |------|------|-------|
//! | `UNKNOWN_BROKER` | 400 | Broker id not in the supported-broker table |
//! | `INVALID_ORDER` | 400 | Missing or invalid order fields |
//! | `INVALID_REQUEST` | 400 | Malformed non-order request |
//! | `DECRYPTION_FAILED` | 422 | Credential blob unreadable |
//! | `NOT_FOUND` | 404 | Connection/order/position does not exist |
//! | `AUTH_REJECTED` | 401 | Broker refused the handshake |
//! | `ORDER_REJECTED` | 409 | Broker refused the order |
//! | `TRANSPORT_ERROR` | 502 | Stream delivery failure |
//! | `BROKER_UNAVAILABLE` | 503 | Broker could not be reached |
//! | `INTERNAL_ERROR` | 500 | Unexpected engine failure |

use std::collections::HashMap;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for the brokerage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unsupported broker id.
    UnknownBroker,
    /// Missing or invalid order fields.
    InvalidOrder,
    /// Malformed request outside order placement.
    InvalidRequest,
    /// Credential blob could not be decrypted.
    DecryptionFailed,
    /// Operation on a nonexistent connection, order or position.
    NotFound,
    /// Broker refused the connection handshake.
    AuthRejected,
    /// Broker refused the order.
    OrderRejected,
    /// Streaming delivery failure.
    TransportError,
    /// Broker could not be reached.
    BrokerUnavailable,
    /// Internal engine failure.
    InternalError,
}

impl ErrorCode {
    /// HTTP status used when this error crosses the HTTP boundary.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::UnknownBroker | Self::InvalidOrder | Self::InvalidRequest => {
                StatusCode::BAD_REQUEST
            }
            Self::DecryptionFailed => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AuthRejected => StatusCode::UNAUTHORIZED,
            Self::OrderRejected => StatusCode::CONFLICT,
            Self::TransportError => StatusCode::BAD_GATEWAY,
            Self::BrokerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::UnknownBroker => "UNKNOWN_BROKER",
            Self::InvalidOrder => "INVALID_ORDER",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::AuthRejected => "AUTH_REJECTED",
            Self::OrderRejected => "ORDER_REJECTED",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::BrokerUnavailable => "BROKER_UNAVAILABLE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// An engine error with a stable code and context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub struct EngineError {
    code: ErrorCode,
    message: String,
    context: Vec<(String, String)>,
}

impl EngineError {
    /// Create a new engine error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Convert to the HTTP error body.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code.reason().to_string(),
            message: self.message.clone(),
            details: self.context.iter().cloned().collect(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)
    }
}

/// HTTP error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code string.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional details.
    pub details: HashMap<String, String>,
}

/// Convenience constructors for common errors.
impl EngineError {
    /// Broker id not in the supported table.
    #[must_use]
    pub fn unknown_broker(broker_id: &str) -> Self {
        Self::new(
            ErrorCode::UnknownBroker,
            format!("Broker '{broker_id}' is not supported"),
        )
        .with_context("broker_id", broker_id)
    }

    /// Invalid order field.
    #[must_use]
    pub fn invalid_order(field: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOrder, message).with_context("field", field)
    }

    /// Malformed request.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Entity not found.
    #[must_use]
    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(ErrorCode::NotFound, format!("{entity} {id} not found"))
            .with_context("entity", entity)
            .with_context("id", id)
    }

    /// Stream delivery failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransportError, message)
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorCode::UnknownBroker.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidOrder.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::DecryptionFailed.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_creation_with_context() {
        let error = EngineError::invalid_order("quantity", "quantity must be positive")
            .with_context("value", "-1");

        assert_eq!(error.code(), ErrorCode::InvalidOrder);
        assert_eq!(error.message(), "quantity must be positive");
        assert_eq!(error.context().len(), 2);
    }

    #[test]
    fn to_response_carries_details() {
        let response = EngineError::unknown_broker("robinhood").to_response();

        assert_eq!(response.code, "UNKNOWN_BROKER");
        assert_eq!(
            response.details.get("broker_id").map(String::as_str),
            Some("robinhood")
        );
    }

    #[test]
    fn error_display() {
        let error = EngineError::not_found("order", "ord-1");
        assert_eq!(error.to_string(), "[NOT_FOUND] order ord-1 not found");
    }

    #[test]
    fn error_code_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::DecryptionFailed).unwrap(),
            "\"DECRYPTION_FAILED\""
        );
    }
}
