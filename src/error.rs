//! Error types for the classifier seam, the feedback ledger and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;

/// Failure of a single classifier call. Never fatal to a conversation:
/// the aggregation engine logs it and skips the snippet.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
    #[error("classifier transport error: {0}")]
    Transport(String),
    #[error("classifier returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Invalid probabilities handed to a typed constructor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistributionError {
    #[error("probability for {0} is negative or not finite")]
    InvalidComponent(&'static str),
    #[error("probabilities sum to {0}, expected 1")]
    BadSum(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("same label ({0}), no correction needed")]
    NoOpCorrection(String),
    #[error("feedback store I/O failed: {0}")]
    Storage(#[from] std::io::Error),
    #[error("feedback store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FeedbackError {
    /// Validation errors are the caller's fault; the rest are ours.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::NoOpCorrection(_))
    }
}

/// Errors rendered by the HTTP layer as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<FeedbackError> for ApiError {
    fn from(e: FeedbackError) -> Self {
        if e.is_validation() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
