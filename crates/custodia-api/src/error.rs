//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("timed out: {0}")]
  Timeout(String),

  #[error("engine error: {0}")]
  Engine(#[source] custodia_engine::Error),
}

impl From<custodia_engine::Error> for ApiError {
  fn from(e: custodia_engine::Error) -> Self {
    use custodia_core::Error as Core;
    use custodia_engine::Error as E;

    match e {
      E::SubjectNotFound(_) | E::RequestNotFound(_) | E::NoActiveHold(_) => {
        ApiError::NotFound(e.to_string())
      }
      E::ConcurrentRequest(_) | E::HoldAlreadyActive(_) => {
        ApiError::Conflict(e.to_string())
      }
      E::Core(Core::InvalidTransition { .. }) => ApiError::Unprocessable(e.to_string()),
      E::Core(Core::UnknownCategory(_)) => ApiError::BadRequest(e.to_string()),
      E::Timeout(_) => ApiError::Timeout(e.to_string()),
      other => ApiError::Engine(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Timeout(m) => (StatusCode::GATEWAY_TIMEOUT, m.clone()),
      ApiError::Engine(e) => {
        error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
