//! Handlers for `/subjects/:id/consents` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects/:id/consents` | Current state per purpose |
//! | `PUT`  | `/subjects/:id/consents/:purpose` | Body: `{"state":"granted"\|"withdrawn"}` |
//!
//! Unrecognised purposes are accepted and recorded; they trigger no
//! downstream actions.

use axum::{
  Extension,
  Json,
  extract::{Path, State},
};
use custodia_core::{
  consent::{ConsentPurpose, ConsentRecord, ConsentState},
  store::{AuditSink, RecordStore},
  subject::{Actor, SubjectId},
};
use custodia_engine::ConsentChange;
use serde::Deserialize;

use crate::{Engine, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /subjects/:id/consents`
pub async fn list<R, A>(
  State(engine): State<Engine<R, A>>,
  Path(id): Path<String>,
) -> Json<Vec<ConsentRecord>>
where
  R: RecordStore,
  A: AuditSink,
{
  Json(engine.consents(&SubjectId::new(id)).await)
}

// ─── Set ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SetBody {
  pub state: ConsentState,
}

/// `PUT /subjects/:id/consents/:purpose`
pub async fn set<R, A>(
  State(engine): State<Engine<R, A>>,
  Extension(actor): Extension<Actor>,
  Path((id, purpose)): Path<(String, String)>,
  Json(body): Json<SetBody>,
) -> Result<Json<ConsentChange>, ApiError>
where
  R: RecordStore,
  A: AuditSink,
{
  if purpose.trim().is_empty() {
    return Err(ApiError::BadRequest("purpose must not be empty".into()));
  }
  let change = engine
    .set_consent(
      &SubjectId::new(id),
      &ConsentPurpose::parse(&purpose),
      body.state,
      &actor,
    )
    .await?;
  Ok(Json(change))
}
