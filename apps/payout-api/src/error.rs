//! Error types for the payout API.
//!
//! Every failure becomes a status code and a JSON body:
//!
//! ```text
//! HTTP/1.1 409 Conflict
//! { "code": "INVALID_TRANSITION", "message": "Payout p-1 cannot move from paid to draft" }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use payout_core::CoreError;
use payout_settlement::SettlementError;
use serde::Serialize;
use tracing::error;

/// Payout API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        ApiError::Settlement(SettlementError::Core(error))
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::Settlement(e) => match e {
                SettlementError::Core(core) => core_status(core),
                SettlementError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                SettlementError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                SettlementError::Transfer(_) => (StatusCode::BAD_GATEWAY, "TRANSFER_FAILED"),
                SettlementError::TransferExhausted { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "TRANSFER_UNAVAILABLE")
                }
                SettlementError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            },
        }
    }
}

fn core_status(error: &CoreError) -> (StatusCode, &'static str) {
    match error {
        CoreError::CurrencyMismatch { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "CURRENCY_MISMATCH"),
        CoreError::AmountOverflow => (StatusCode::UNPROCESSABLE_ENTITY, "AMOUNT_OVERFLOW"),
        CoreError::PeriodOverlap { .. } => (StatusCode::CONFLICT, "PERIOD_OVERLAP"),
        CoreError::EmptyPayout { .. } => (StatusCode::CONFLICT, "EMPTY_PAYOUT"),
        CoreError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        CoreError::Immutable { .. } => (StatusCode::CONFLICT, "IMMUTABLE"),
        CoreError::ReferenceConflict { .. } => (StatusCode::CONFLICT, "REFERENCE_CONFLICT"),
        CoreError::ConcurrentModification { .. } => (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION"),
        CoreError::RuleMissing { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "RULE_MISSING"),
        CoreError::InvalidPeriod(_) => (StatusCode::BAD_REQUEST, "INVALID_PERIOD"),
        CoreError::InvalidCurrency(_) => (StatusCode::BAD_REQUEST, "INVALID_CURRENCY"),
        CoreError::Export(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_FAILED"),
        CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, error = %self, "Request failed");
        }
        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
