// =============================================================================
// ERROR MODULE
// =============================================================================
// Two error families:
// - ComputationError: the reorder math refused its input. Never reaches HTTP
//   callers of the dispatcher; the calculator maps it to a safe default.
// - AppError: request-level failures, converted to JSON HTTP responses.
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// =============================================================================
// COMPUTATION ERRORS
// =============================================================================
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    /// A sale line carried a negative quantity
    #[error("Negative quantity {quantity} in sales history on {date}")]
    NegativeQuantity { date: chrono::NaiveDate, quantity: i32 },

    /// An intermediate value was NaN or infinite
    #[error("Non-finite {stage}: {value}")]
    NonFinite { stage: &'static str, value: f64 },

    /// The result does not fit the stock quantity range
    #[error("{stage} out of range: {value}")]
    OutOfRange { stage: &'static str, value: f64 },
}

// =============================================================================
// APPLICATION ERRORS
// =============================================================================
#[derive(Debug, Error)]
pub enum AppError {
    /// Product or order not found in the catalog
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Reorder computation failed for an explicitly requested report
    #[error("Computation error: {0}")]
    Computation(#[from] ComputationError),

    /// Generic internal error, including catalog and database failures
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Computation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// HTTP RESPONSE CONVERSION
// =============================================================================
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_code, message) = match &self {
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg.clone()),
            AppError::Computation(err) => ("COMPUTATION_ERROR", err.to_string()),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg.clone()),
        };

        tracing::error!(
            error_code = error_code,
            message = %message,
            "Request failed"
        );

        let body = ErrorResponse::new(error_code, message);

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound("product 9".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
            (
                AppError::Computation(ComputationError::NonFinite {
                    stage: "daily demand",
                    value: f64::NAN,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected);
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_anyhow_becomes_internal() {
        let err: AppError = anyhow::anyhow!("pool closed").into();
        assert!(matches!(err, AppError::Internal(msg) if msg == "pool closed"));
    }
}
