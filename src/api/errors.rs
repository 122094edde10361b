//! Structured API error responses with request tracking.
//!
//! Every error body carries the request id from the middleware so a client
//! report can be matched to server logs. Core errors map onto HTTP codes
//! here and nowhere else.

use crate::errors::{CoreError, GameError, LedgerError, ReplayError, SeedError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (NOT_FOUND, BAD_REQUEST, CONFLICT, ...).
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    /// Write-once or optimistic-commit collision; the request may be retried.
    Conflict(String),
    InsufficientFunds(String),
    InternalError(String),
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn not_found(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::NotFound(message),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn conflict(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::Conflict(message),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }

    pub fn service_unavailable(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::ServiceUnavailable(message),
            request_id,
        }
    }

    /// Map a core error onto an HTTP-facing error.
    pub fn from_core(request_id: String, err: CoreError) -> Self {
        let kind = match &err {
            CoreError::Seed(SeedError::NotFound { .. })
            | CoreError::Seed(SeedError::NoActivePair { .. })
            | CoreError::Ledger(LedgerError::WalletNotFound { .. })
            | CoreError::Replay(ReplayError::SessionNotFound { .. }) => {
                ApiErrorKind::NotFound(err.to_string())
            }
            CoreError::Seed(SeedError::SeedStillActive { .. })
            | CoreError::Seed(SeedError::SeedRetired { .. })
            | CoreError::Replay(ReplayError::StepAlreadyRecorded { .. }) => {
                ApiErrorKind::Conflict(err.to_string())
            }
            // Transient: the retry budget ran out, a later attempt may pass.
            CoreError::Ledger(LedgerError::LedgerConflict { .. })
            | CoreError::Seed(SeedError::SeedConflict { .. }) => {
                ApiErrorKind::ServiceUnavailable(err.to_string())
            }
            CoreError::Ledger(LedgerError::InsufficientFunds { .. }) => {
                ApiErrorKind::InsufficientFunds(err.to_string())
            }
            CoreError::Game(GameError::InvalidGameParams(_))
            | CoreError::Game(GameError::NonceExhausted { .. })
            | CoreError::Ledger(LedgerError::UnknownAsset(_))
            | CoreError::Ledger(LedgerError::PrecisionExceeded { .. })
            | CoreError::Ledger(LedgerError::NonFiniteAmount)
            | CoreError::Replay(ReplayError::InvalidRange { .. }) => {
                ApiErrorKind::BadRequest(err.to_string())
            }
            CoreError::Storage(_) | CoreError::Configuration(_) => {
                tracing::error!(%request_id, error = %err, "internal error");
                ApiErrorKind::InternalError("internal error".to_string())
            }
        };
        Self { kind, request_id }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::BadRequest(msg) => {
                write!(f, "[{}] Bad Request: {}", self.request_id, msg)
            }
            ApiErrorKind::Conflict(msg) => write!(f, "[{}] Conflict: {}", self.request_id, msg),
            ApiErrorKind::InsufficientFunds(msg) => {
                write!(f, "[{}] Insufficient Funds: {}", self.request_id, msg)
            }
            ApiErrorKind::InternalError(msg) => {
                write!(f, "[{}] Internal Error: {}", self.request_id, msg)
            }
            ApiErrorKind::ServiceUnavailable(msg) => {
                write!(f, "[{}] Service Unavailable: {}", self.request_id, msg)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiErrorKind::InsufficientFunds(msg) => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_FUNDS",
                msg.clone(),
            ),
            ApiErrorKind::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
            ApiErrorKind::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message,
                details: None,
            },
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let err = ApiError::from_core(
            "req-1".to_string(),
            CoreError::Ledger(LedgerError::InsufficientFunds {
                balance: 10,
                requested: -20,
            }),
        );
        assert!(matches!(err.kind, ApiErrorKind::InsufficientFunds(_)));

        let err = ApiError::from_core(
            "req-2".to_string(),
            CoreError::Seed(SeedError::SeedStillActive {
                seed_pair_id: "sp-1".to_string(),
            }),
        );
        assert!(matches!(err.kind, ApiErrorKind::Conflict(_)));

        let err = ApiError::from_core(
            "req-3".to_string(),
            CoreError::Replay(ReplayError::SessionNotFound {
                session_id: "s1".to_string(),
            }),
        );
        assert!(matches!(err.kind, ApiErrorKind::NotFound(_)));
    }

    #[test]
    fn test_internal_errors_do_not_leak_detail() {
        let err = ApiError::from_core(
            "req-4".to_string(),
            CoreError::Storage(crate::errors::StorageError::WriteFailed(
                "/var/lib/secret/path".to_string(),
            )),
        );
        match err.kind {
            ApiErrorKind::InternalError(msg) => assert_eq!(msg, "internal error"),
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
