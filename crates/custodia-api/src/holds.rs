//! Handlers for `/subjects/:id/hold`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/subjects/:id/hold` | 404 if no hold is active |
//! | `POST`   | `/subjects/:id/hold` | Body: `{"reason":"..."}`; privileged only |
//! | `DELETE` | `/subjects/:id/hold` | Privileged only |

use axum::{
  Extension,
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use custodia_core::{
  hold::LegalHold,
  store::{AuditSink, RecordStore},
  subject::{Actor, SubjectId},
};
use serde::Deserialize;

use crate::{Engine, error::ApiError};

fn require_privileged(actor: &Actor) -> Result<(), ApiError> {
  if actor.privileged {
    Ok(())
  } else {
    Err(ApiError::Forbidden(format!(
      "{} may not manage legal holds",
      actor.name
    )))
  }
}

/// `GET /subjects/:id/hold`
pub async fn get_one<R, A>(
  State(engine): State<Engine<R, A>>,
  Path(id): Path<String>,
) -> Result<Json<LegalHold>, ApiError>
where
  R: RecordStore,
  A: AuditSink,
{
  engine
    .active_hold(&SubjectId::new(id.as_str()))
    .await
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("no active hold for {id}")))
}

#[derive(Debug, Deserialize)]
pub struct PlaceBody {
  pub reason: String,
}

/// `POST /subjects/:id/hold`
pub async fn place<R, A>(
  State(engine): State<Engine<R, A>>,
  Extension(actor): Extension<Actor>,
  Path(id): Path<String>,
  Json(body): Json<PlaceBody>,
) -> Result<impl IntoResponse, ApiError>
where
  R: RecordStore,
  A: AuditSink,
{
  require_privileged(&actor)?;
  if body.reason.trim().is_empty() {
    return Err(ApiError::BadRequest("reason must not be empty".into()));
  }
  let hold = engine
    .place_hold(&SubjectId::new(id), &body.reason, &actor)
    .await?;
  Ok((StatusCode::CREATED, Json(hold)))
}

/// `DELETE /subjects/:id/hold`
pub async fn release<R, A>(
  State(engine): State<Engine<R, A>>,
  Extension(actor): Extension<Actor>,
  Path(id): Path<String>,
) -> Result<Json<LegalHold>, ApiError>
where
  R: RecordStore,
  A: AuditSink,
{
  require_privileged(&actor)?;
  Ok(Json(engine.release_hold(&SubjectId::new(id), &actor).await?))
}
