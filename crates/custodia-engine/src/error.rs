//! Error type for `custodia-engine`.
//!
//! Only subject-level failures surface here. Legal-hold refusals and
//! category-level failures are outcomes, reported through
//! [`DeletionRequest::status`](custodia_core::deletion::DeletionRequest) and
//! its summary.

use std::time::Duration;

use custodia_core::{audit::IntegrityError, subject::SubjectId};
use thiserror::Error;
use uuid::Uuid;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(SubjectId),

  #[error("a deletion request is already in progress for subject {0}")]
  ConcurrentRequest(SubjectId),

  /// The audit sink rejected a write; the triggering mutation was not applied.
  #[error("audit write failed: {0}")]
  AuditWrite(#[source] BoxError),

  #[error("audit read failed: {0}")]
  AuditRead(#[source] BoxError),

  #[error("audit trail integrity violation: {0}")]
  Integrity(#[from] IntegrityError),

  #[error("subject {0} already has an active legal hold")]
  HoldAlreadyActive(SubjectId),

  #[error("subject {0} has no active legal hold")]
  NoActiveHold(SubjectId),

  #[error("deletion request not found: {0}")]
  RequestNotFound(Uuid),

  #[error("record store error: {0}")]
  Store(#[source] BoxError),

  #[error("record store call timed out after {0:?}")]
  Timeout(Duration),

  #[error(transparent)]
  Core(#[from] custodia_core::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
