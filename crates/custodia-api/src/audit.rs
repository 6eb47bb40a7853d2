//! Read-only views of the audit trail.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects/:id/audit` | Events in sequence order |
//! | `GET`  | `/audit/verify` | Recomputes the whole hash chain |

use axum::{
  Json,
  extract::{Path, State},
};
use custodia_core::{
  audit::AuditEvent,
  store::{AuditSink, RecordStore},
  subject::SubjectId,
};
use custodia_engine::IntegrityReport;

use crate::{Engine, error::ApiError};

/// `GET /subjects/:id/audit`
pub async fn trail<R, A>(
  State(engine): State<Engine<R, A>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<AuditEvent>>, ApiError>
where
  R: RecordStore,
  A: AuditSink,
{
  Ok(Json(engine.audit_trail(&SubjectId::new(id)).await?))
}

/// `GET /audit/verify`
pub async fn verify<R, A>(
  State(engine): State<Engine<R, A>>,
) -> Result<Json<IntegrityReport>, ApiError>
where
  R: RecordStore,
  A: AuditSink,
{
  Ok(Json(engine.verify_audit_trail().await?))
}
