use crate::services::ledger_service::LedgerError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// HTTP-facing error: a status code plus a message rendered as JSON.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::IdentityMismatch { .. } => {
                AppError::new(StatusCode::CONFLICT, err.to_string())
            }
            LedgerError::InvalidInput(_) => AppError::new(StatusCode::BAD_REQUEST, err.to_string()),
            LedgerError::FlowIdsCodec(_) | LedgerError::Sqlx(_) => {
                tracing::error!("ledger failure: {}", err);
                AppError::internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mismatch_maps_to_conflict() {
        let err = AppError::from(LedgerError::IdentityMismatch {
            bucket: "b".into(),
            object_name: "o".into(),
            field: "owner",
            stored: "ow1".into(),
            supplied: "ow2".into(),
        });
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert!(err.message.contains("ow2"));
    }

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let err = AppError::from(LedgerError::InvalidInput("size must be non-negative".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_failure_maps_to_internal() {
        let err = AppError::from(LedgerError::Sqlx(sqlx::Error::PoolTimedOut));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
