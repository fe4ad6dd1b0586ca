//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use senslab_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Core(e) if e.is_not_found() => StatusCode::NOT_FOUND,
      ApiError::Core(e) => match e {
        CoreError::InvalidInput(_)
        | CoreError::SeatRequired
        | CoreError::MethodMismatch { .. } => StatusCode::BAD_REQUEST,
        CoreError::TokenExpiredOrUsed => StatusCode::GONE,
        CoreError::SessionNotReady(_) | CoreError::TripletsNotGenerated(_) => {
          StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
