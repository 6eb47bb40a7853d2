//! Deterministic in-memory collaborators.
//!
//! Used by the engine's own tests and by downstream crates that need an
//! engine without a database. The record store can be told to fail, stall or
//! silently ignore deletes per category so partial-failure paths are
//! reachable.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use custodia_core::{
  audit::{AuditAction, AuditEvent, ChainHead},
  category::DataCategory,
  consent::DispatchedAction,
  record::{Record, redact_named},
  store::{ActionNotifier, AuditSink, NotifyError, RecordStore},
  subject::SubjectId,
};
use thiserror::Error;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Record store ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MemoryStoreError {
  #[error("injected failure for category {0}")]
  Injected(DataCategory),
}

#[derive(Debug, Default)]
struct Records {
  subjects:        HashSet<SubjectId>,
  records:         Vec<Record>,
  failing:         HashSet<DataCategory>,
  stalled:         HashSet<DataCategory>,
  ignore_deletes:  HashSet<DataCategory>,
  mutation_calls:  u64,
}

/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
  inner: Arc<Mutex<Records>>,
}

impl MemoryRecordStore {
  pub fn new() -> Self { Self::default() }

  pub fn add_subject(&self, subject_id: impl Into<SubjectId>) {
    lock(&self.inner).subjects.insert(subject_id.into());
  }

  pub fn insert(&self, record: Record) -> Uuid {
    let id = record.record_id;
    let mut inner = lock(&self.inner);
    inner.subjects.insert(record.subject_id.clone());
    inner.records.push(record);
    id
  }

  pub fn records(&self, subject_id: &SubjectId, category: DataCategory) -> Vec<Record> {
    lock(&self.inner)
      .records
      .iter()
      .filter(|r| &r.subject_id == subject_id && r.category == category)
      .cloned()
      .collect()
  }

  /// Make every delete or anonymise call in `category` fail.
  pub fn fail_mutations(&self, category: DataCategory) {
    lock(&self.inner).failing.insert(category);
  }

  /// Make listing `category` hang forever.
  pub fn stall_listing(&self, category: DataCategory) {
    lock(&self.inner).stalled.insert(category);
  }

  /// Report deletes in `category` as successful without removing anything.
  pub fn ignore_deletes(&self, category: DataCategory) {
    lock(&self.inner).ignore_deletes.insert(category);
  }

  /// Delete and anonymise calls received so far, successful or not.
  pub fn mutation_calls(&self) -> u64 { lock(&self.inner).mutation_calls }

  fn begin_mutation(&self, category: DataCategory) -> Result<(), MemoryStoreError> {
    let mut inner = lock(&self.inner);
    inner.mutation_calls += 1;
    if inner.failing.contains(&category) {
      return Err(MemoryStoreError::Injected(category));
    }
    Ok(())
  }
}

impl RecordStore for MemoryRecordStore {
  type Error = MemoryStoreError;

  async fn subject_exists(&self, subject_id: &SubjectId) -> Result<bool, Self::Error> {
    Ok(lock(&self.inner).subjects.contains(subject_id))
  }

  async fn list_records(
    &self,
    subject_id: &SubjectId,
    category: DataCategory,
  ) -> Result<Vec<Record>, Self::Error> {
    let stalled = lock(&self.inner).stalled.contains(&category);
    if stalled {
      std::future::pending::<()>().await;
    }
    Ok(self.records(subject_id, category))
  }

  async fn delete_record(
    &self,
    category: DataCategory,
    record_id: Uuid,
  ) -> Result<bool, Self::Error> {
    self.begin_mutation(category)?;
    let mut inner = lock(&self.inner);
    if inner.ignore_deletes.contains(&category) {
      return Ok(true);
    }
    let before = inner.records.len();
    inner
      .records
      .retain(|r| !(r.record_id == record_id && r.category == category));
    Ok(inner.records.len() < before)
  }

  async fn anonymize_record(
    &self,
    category: DataCategory,
    record_id: Uuid,
    fields: &[String],
  ) -> Result<bool, Self::Error> {
    self.begin_mutation(category)?;
    let mut inner = lock(&self.inner);
    let Some(record) = inner
      .records
      .iter_mut()
      .find(|r| r.record_id == record_id && r.category == category)
    else {
      return Ok(false);
    };
    if record.anonymized {
      return Ok(false);
    }
    redact_named(&mut record.fields, fields);
    record.anonymized = true;
    Ok(true)
  }
}

// ─── Audit sink ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MemorySinkError {
  #[error("audit sink unavailable")]
  Unavailable,
}

#[derive(Debug, Default)]
struct Events {
  events:      Vec<AuditEvent>,
  unavailable: bool,
  refused:     HashSet<AuditAction>,
}

/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
  inner: Arc<Mutex<Events>>,
}

impl MemoryAuditSink {
  pub fn new() -> Self { Self::default() }

  /// While set, every append fails.
  pub fn set_unavailable(&self, unavailable: bool) {
    lock(&self.inner).unavailable = unavailable;
  }

  /// Appends of `action` fail from now on; every other action still lands.
  pub fn refuse(&self, action: AuditAction) { lock(&self.inner).refused.insert(action); }

  pub fn events(&self) -> Vec<AuditEvent> { lock(&self.inner).events.clone() }

  pub fn len(&self) -> usize { lock(&self.inner).events.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Rewrite a stored event in place, bypassing the append-only contract.
  /// Exists to exercise integrity verification.
  pub fn tamper(&self, sequence: u64, edit: impl FnOnce(&mut AuditEvent)) {
    let mut inner = lock(&self.inner);
    if let Some(event) = inner.events.iter_mut().find(|e| e.sequence == sequence) {
      edit(event);
    }
  }

  /// Drop the newest `count` events, bypassing the append-only contract.
  pub fn truncate_tail(&self, count: usize) {
    let mut inner = lock(&self.inner);
    let keep = inner.events.len().saturating_sub(count);
    inner.events.truncate(keep);
  }
}

impl AuditSink for MemoryAuditSink {
  type Error = MemorySinkError;

  async fn append(&self, event: &AuditEvent) -> Result<(), Self::Error> {
    let mut inner = lock(&self.inner);
    if inner.unavailable || inner.refused.contains(&event.action) {
      return Err(MemorySinkError::Unavailable);
    }
    inner.events.push(event.clone());
    Ok(())
  }

  async fn head(&self) -> Result<ChainHead, Self::Error> {
    Ok(
      lock(&self.inner)
        .events
        .last()
        .map_or_else(ChainHead::genesis, AuditEvent::head),
    )
  }

  async fn all_events(&self) -> Result<Vec<AuditEvent>, Self::Error> { Ok(self.events()) }

  async fn events_for(&self, subject_id: &SubjectId) -> Result<Vec<AuditEvent>, Self::Error> {
    Ok(
      lock(&self.inner)
        .events
        .iter()
        .filter(|e| &e.subject_id == subject_id)
        .cloned()
        .collect(),
    )
  }

  async fn flush(&self) -> Result<(), Self::Error> { Ok(()) }
}

// ─── Notifiers ───────────────────────────────────────────────────────────────

/// Keeps every action it is handed. Can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
  received: Mutex<Vec<DispatchedAction>>,
  failing:  Mutex<bool>,
}

impl RecordingNotifier {
  pub fn new() -> Self { Self::default() }

  pub fn set_failing(&self, failing: bool) { *lock(&self.failing) = failing; }

  pub fn received(&self) -> Vec<DispatchedAction> { lock(&self.received).clone() }
}

impl ActionNotifier for RecordingNotifier {
  fn notify(&self, action: &DispatchedAction) -> Result<(), NotifyError> {
    lock(&self.received).push(action.clone());
    if *lock(&self.failing) {
      return Err(format!("downstream rejected {}", action.action).into());
    }
    Ok(())
  }
}
