//! Handler for subject access exports.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects/:id/export` | Optional `?anonymize=true` |

use axum::{
  Extension,
  Json,
  extract::{Path, Query, State},
};
use custodia_core::{
  export::ExportBundle,
  store::{AuditSink, RecordStore},
  subject::{Actor, SubjectId},
};
use serde::Deserialize;

use crate::{Engine, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
  #[serde(default)]
  pub anonymize: bool,
}

/// `GET /subjects/:id/export[?anonymize=<bool>]`
pub async fn export<R, A>(
  State(engine): State<Engine<R, A>>,
  Extension(actor): Extension<Actor>,
  Path(id): Path<String>,
  Query(params): Query<ExportParams>,
) -> Result<Json<ExportBundle>, ApiError>
where
  R: RecordStore,
  A: AuditSink,
{
  let bundle = engine
    .request_export(&SubjectId::new(id), params.anonymize, &actor)
    .await?;
  Ok(Json(bundle))
}
