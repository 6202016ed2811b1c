//! Relayer error types with HTTP status code mapping.
//!
//! [`RelayerError`] is the central error type for the relayer. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//!
//! The chain-facing variants follow the dispatch pipeline: failures before
//! submission (`Signing`, `ChainQuery`, `EncodingInvariant`) abort the cycle
//! with no on-chain side effects, while `Transaction`,
//! `TransactionReverted` and `ReceiptTimeout` describe a submission that
//! consumed nothing and left every record eligible for the next cycle.

use alloy::primitives::{Address, B256};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4002,
///     "message": "chain query failed: nonce lookup timed out",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`RelayerError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                |
/// |-----------|-----------------|----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request            |
/// | 2000–2999 | State/Not Found | 404 Not Found              |
/// | 3000–3999 | Server/Storage  | 500 Internal Server Error  |
/// | 4000–4999 | Chain/Dispatch  | 500 / 502 / 504            |
#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A device or auditor address is required but was missing.
    #[error("address is required")]
    AddressRequired,

    /// The device is not registered with this relayer.
    #[error("device not registered: {0}")]
    DeviceNotRegistered(Address),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Permit signing failed (key material unavailable or signer error).
    #[error("permit signing failed: {0}")]
    Signing(String),

    /// An on-chain read (nonce, block timestamp) failed.
    #[error("chain query failed: {0}")]
    ChainQuery(String),

    /// The batch payload violated an encoding invariant (mismatched array
    /// lengths or an empty batch) and was rejected before dispatch.
    #[error("batch encoding invariant violated: {0}")]
    EncodingInvariant(String),

    /// The batch transaction was rejected at submission.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// The whole batch transaction reverted on-chain. Distinct from an
    /// individual sub-call failing, which is a valid terminal outcome.
    #[error("batch transaction reverted: {0}")]
    TransactionReverted(B256),

    /// Inclusion was not observed within the bounded wait.
    #[error("no receipt after {waited_secs} s; cycle abandoned")]
    ReceiptTimeout {
        /// Seconds waited before giving up on the receipt.
        waited_secs: u64,
    },

    /// A receipt log could not be correlated back to a record.
    #[error("reconciliation failed: {0}")]
    Reconciliation(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::AddressRequired => 1002,
            Self::DeviceNotRegistered(_) => 2001,
            Self::Internal(_) => 3000,
            Self::Storage(_) => 3001,
            Self::Signing(_) => 4001,
            Self::ChainQuery(_) => 4002,
            Self::EncodingInvariant(_) => 4003,
            Self::Transaction(_) => 4004,
            Self::TransactionReverted(_) => 4005,
            Self::ReceiptTimeout { .. } => 4006,
            Self::Reconciliation(_) => 4007,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::AddressRequired => StatusCode::BAD_REQUEST,
            Self::DeviceNotRegistered(_) => StatusCode::NOT_FOUND,
            Self::Storage(_)
            | Self::Internal(_)
            | Self::Signing(_)
            | Self::EncodingInvariant(_)
            | Self::Reconciliation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ChainQuery(_) | Self::Transaction(_) | Self::TransactionReverted(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::ReceiptTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for RelayerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
