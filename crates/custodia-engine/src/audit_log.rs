//! The engine's view of the audit trail: seals events into the hash chain and
//! hands them to the sink.

use chrono::Utc;
use custodia_core::{
  audit::{AuditEvent, ChainHead, IntegrityError, NewAuditEvent, verify_chain},
  store::AuditSink,
  subject::SubjectId,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Outcome of a full chain verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
  pub events:    u64,
  pub head_hash: String,
}

pub struct AuditLog<A> {
  sink: A,
  /// Held across the sink write so sequence numbers are assigned in the order
  /// events become durable.
  head: Mutex<ChainHead>,
}

impl<A: AuditSink> AuditLog<A> {
  pub fn new(sink: A) -> Self { Self { sink, head: Mutex::new(ChainHead::genesis()) } }

  /// Load and verify the persisted chain, positioning the head after its last
  /// event. Returns the verified events for projection replay.
  pub async fn recover(&self) -> Result<Vec<AuditEvent>> {
    let events = self.all_events().await?;
    let head = verify_chain(&events)?;
    debug!(events = events.len(), head = %head.hash, "recovered audit chain");
    *self.head.lock().await = head;
    Ok(events)
  }

  /// Seal and durably persist one event. If the sink refuses the write the
  /// head does not move and the caller must abandon its mutation.
  pub async fn append(&self, event: NewAuditEvent) -> Result<AuditEvent> {
    let mut head = self.head.lock().await;
    let sealed = AuditEvent::seal(event, &head, Utc::now());
    if let Err(e) = self.sink.append(&sealed).await {
      error!(
        action = %sealed.action,
        subject = %sealed.subject_id,
        "audit write failed: {e}"
      );
      return Err(Error::AuditWrite(Box::new(e)));
    }
    *head = sealed.head();
    Ok(sealed)
  }

  pub async fn all_events(&self) -> Result<Vec<AuditEvent>> {
    self
      .sink
      .all_events()
      .await
      .map_err(|e| Error::AuditRead(Box::new(e)))
  }

  pub async fn events_for(&self, subject_id: &SubjectId) -> Result<Vec<AuditEvent>> {
    self
      .sink
      .events_for(subject_id)
      .await
      .map_err(|e| Error::AuditRead(Box::new(e)))
  }

  /// Re-walk the persisted chain and check that it ends where the sink says it
  /// does, and no earlier than the last event this log sealed.
  pub async fn verify(&self) -> Result<IntegrityReport> {
    // Appends wait until the walk is done, so the sealed head stays comparable.
    let sealed = self.head.lock().await;
    let events = self.all_events().await?;
    let head = verify_chain(&events)?;
    let persisted = self
      .sink
      .head()
      .await
      .map_err(|e| Error::AuditRead(Box::new(e)))?;
    if persisted != head {
      return Err(
        IntegrityError::SequenceGap {
          expected: head.sequence,
          found:    persisted.sequence,
        }
        .into(),
      );
    }
    if head.sequence < sealed.sequence {
      return Err(
        IntegrityError::Truncated {
          expected: sealed.sequence,
          found:    head.sequence,
        }
        .into(),
      );
    }
    if head.sequence == sealed.sequence && head.hash != sealed.hash {
      return Err(IntegrityError::HashMismatch { sequence: head.sequence }.into());
    }
    Ok(IntegrityReport { events: head.sequence, head_hash: head.hash })
  }

  pub async fn head(&self) -> ChainHead { self.head.lock().await.clone() }

  pub async fn flush(&self) -> Result<()> {
    self
      .sink
      .flush()
      .await
      .map_err(|e| Error::AuditWrite(Box::new(e)))
  }
}
