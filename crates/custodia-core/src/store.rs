//! The traits through which the engine reaches its external collaborators.
//!
//! - [`RecordStore`]: the opaque relational store holding subjects' records.
//! - [`AuditSink`]: durable, append-only persistence for audit events.
//! - [`ActionNotifier`]: fire-and-log delivery to downstream actors.
//!
//! All async methods return `Send` futures so implementations can be shared
//! across a multi-threaded tokio runtime.

use std::future::Future;

use uuid::Uuid;

use crate::{
  audit::{AuditEvent, ChainHead},
  category::DataCategory,
  consent::DispatchedAction,
  record::Record,
  subject::SubjectId,
};

// ─── Record store ────────────────────────────────────────────────────────────

/// Each call is individually atomic; nothing is transactional across
/// categories.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn subject_exists<'a>(
    &'a self,
    subject_id: &'a SubjectId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Every record of `category` that references the subject, including ones
  /// already anonymised.
  fn list_records<'a>(
    &'a self,
    subject_id: &'a SubjectId,
    category: DataCategory,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + 'a;

  /// Hard-delete a record. Returns `false` if it was already gone, which is
  /// not an error.
  fn delete_record(
    &self,
    category: DataCategory,
    record_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Redact `fields` in place and mark the record anonymised. Returns `false`
  /// if the record does not exist or was already anonymised.
  fn anonymize_record<'a>(
    &'a self,
    category: DataCategory,
    record_id: Uuid,
    fields: &'a [String],
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

// ─── Audit sink ──────────────────────────────────────────────────────────────

/// Durable storage for audit events.
///
/// There is deliberately no update or delete method. Implementations must
/// also reject such attempts at the storage layer.
pub trait AuditSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Durably persist one sealed event. Must not return until the write is
  /// committed.
  fn append<'a>(
    &'a self,
    event: &'a AuditEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Sequence and hash of the last persisted event, or genesis when empty.
  fn head(&self) -> impl Future<Output = Result<ChainHead, Self::Error>> + Send + '_;

  /// Every event, in sequence order.
  fn all_events(
    &self,
  ) -> impl Future<Output = Result<Vec<AuditEvent>, Self::Error>> + Send + '_;

  /// Events about one subject, in sequence order.
  fn events_for<'a>(
    &'a self,
    subject_id: &'a SubjectId,
  ) -> impl Future<Output = Result<Vec<AuditEvent>, Self::Error>> + Send + 'a;

  /// Push any buffered state to durable storage. Called on shutdown.
  fn flush(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Downstream actors ───────────────────────────────────────────────────────

pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

/// Hands consent actions to downstream systems (AI pipeline, mailing lists,
/// deletion scheduler). Must not block; failures are logged by the caller and
/// never roll back the recorded intent.
pub trait ActionNotifier: Send + Sync {
  fn notify(&self, action: &DispatchedAction) -> Result<(), NotifyError>;
}
