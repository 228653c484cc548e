//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! | Domain error | Status |
//! |--------------|--------|
//! | `NotFound` | 404 |
//! | `AlreadyResolved` | 200, `{"outcome":"already_resolved"}` |
//! | `ConflictNeedsTransfer` | 409, with the current sponsor |
//! | `StaleTransfer` | 409, `{"retry":true}` |
//! | `NotActive` | 409 |
//! | `Validation` | 422 |
//! | `Forbidden` | 403 |
//! | everything else | 500 |

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use patron_core::Error;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Domain(#[from] Error),

  /// The acting user could not be identified.
  #[error("unauthenticated: {0}")]
  Unauthenticated(String),

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = self.to_string();
    let (status, body) = match self {
      ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, json!({ "error": message })),
      ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
      ApiError::Domain(e) => match e {
        Error::NotFound { .. } => (StatusCode::NOT_FOUND, json!({ "error": message })),
        Error::AlreadyResolved { request_id, status } => (
          StatusCode::OK,
          json!({
            "outcome": "already_resolved",
            "request_id": request_id,
            "status": status,
          }),
        ),
        Error::ConflictNeedsTransfer {
          child_id,
          sponsorship_id,
          current_sponsor_id,
          current_sponsor_name,
        } => (
          StatusCode::CONFLICT,
          json!({
            "error": message,
            "child_id": child_id,
            "sponsorship_id": sponsorship_id,
            "current_sponsor": {
              "sponsor_id": current_sponsor_id,
              "full_name": current_sponsor_name,
            },
          }),
        ),
        Error::StaleTransfer { child_id } => (
          StatusCode::CONFLICT,
          json!({ "error": message, "child_id": child_id, "retry": true }),
        ),
        Error::NotActive(_) => (StatusCode::CONFLICT, json!({ "error": message })),
        Error::Validation(_) => {
          (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": message }))
        }
        Error::Forbidden { .. } => (StatusCode::FORBIDDEN, json!({ "error": message })),
        Error::DataIntegrity { child_id, active_rows } => {
          error!(%child_id, active_rows, "request hit an inconsistent ledger");
          (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
        }
        other => {
          error!(error = %other, "request failed");
          (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "internal error" }))
        }
      },
    };
    (status, Json(body)).into_response()
  }
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
