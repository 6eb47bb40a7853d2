//! Handlers for erasure requests.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/subjects/:id/deletions` | Body: `{"categories":[..]?,"timeout_ms":n?}` |
//! | `GET`  | `/deletions/:request_id` | 404 if the request is unknown |
//!
//! Erasure runs to completion inside the `POST`; the response carries the
//! final request, including `blocked` when a legal hold is active.

use std::time::Duration;

use axum::{
  Extension,
  Json,
  extract::{Path, State},
};
use custodia_core::{
  category::DataCategory,
  deletion::DeletionRequest,
  store::{AuditSink, RecordStore},
  subject::{Actor, SubjectId},
};
use custodia_engine::DeletionParams;
use serde::Deserialize;
use uuid::Uuid;

use crate::{Engine, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateBody {
  /// Restrict erasure to these categories. Omitted means every category.
  pub categories: Option<Vec<DataCategory>>,
  /// Per-store-call timeout overriding the configured default.
  pub timeout_ms: Option<u64>,
}

/// `POST /subjects/:id/deletions`
pub async fn create<R, A>(
  State(engine): State<Engine<R, A>>,
  Extension(actor): Extension<Actor>,
  Path(id): Path<String>,
  Json(body): Json<CreateBody>,
) -> Result<Json<DeletionRequest>, ApiError>
where
  R: RecordStore,
  A: AuditSink,
{
  let mut params = DeletionParams::new(SubjectId::new(id), actor);
  if let Some(categories) = body.categories {
    if categories.is_empty() {
      return Err(ApiError::BadRequest("categories must not be empty".into()));
    }
    params = params.categories(categories);
  }
  if let Some(ms) = body.timeout_ms {
    params = params.timeout(Duration::from_millis(ms));
  }

  let request = engine.request_deletion(params).await?;
  Ok(Json(request))
}

// ─── Poll ─────────────────────────────────────────────────────────────────────

/// `GET /deletions/:request_id`
pub async fn get_one<R, A>(
  State(engine): State<Engine<R, A>>,
  Path(request_id): Path<Uuid>,
) -> Result<Json<DeletionRequest>, ApiError>
where
  R: RecordStore,
  A: AuditSink,
{
  Ok(Json(engine.deletion_status(request_id).await?))
}
