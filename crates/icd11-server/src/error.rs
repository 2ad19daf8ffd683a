//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use icd11_core::Icd11Error;
use serde_json::json;

/// Errors returned by the `/api/icd11` handlers.
///
/// Every variant renders as `{"success": false, "message": ...}`; not-found
/// responses also carry `"data": null`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Icd11(#[from] Icd11Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Icd11(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Icd11(e) = &self {
            if status.is_server_error() {
                tracing::error!(category = %e.category(), error = %e, "ICD-11 request failed");
            } else {
                tracing::debug!(category = %e.category(), error = %e, "ICD-11 request rejected");
            }
        }

        let body = if status == StatusCode::NOT_FOUND {
            json!({"success": false, "data": null, "message": self.to_string()})
        } else {
            json!({"success": false, "message": self.to_string()})
        };
        (status, Json(body)).into_response()
    }
}
