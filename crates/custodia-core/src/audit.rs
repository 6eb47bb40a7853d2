//! Audit events and the hash chain that makes tampering detectable.
//!
//! Audit events are strictly append-only. Each event carries the hash of its
//! predecessor, and its own hash covers that link plus every field of the
//! event, so rewriting or removing any event breaks the chain from that point
//! onwards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

use crate::subject::SubjectId;

/// `prev_hash` of the first event in the chain.
pub const GENESIS_HASH: &str = "genesis";

const HASH_DOMAIN: &[u8] = b"custodia-audit-event-v1";

// ─── Action ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
  ConsentGranted,
  ConsentWithdrawn,
  ConsentActionDispatched,
  LegalHoldPlaced,
  LegalHoldReleased,
  DeletionStarted,
  DeletionBlockedLegalHold,
  DeletionProcessed,
  DataExportRequest,
}

impl AuditAction {
  pub fn parse(s: &str) -> crate::Result<Self> {
    s.parse()
      .map_err(|_| crate::Error::UnknownAction(s.to_owned()))
  }
}

/// Immutable key-value payload of an event. Ordered so the hash input is
/// canonical.
pub type AuditDetails = BTreeMap<String, serde_json::Value>;

// ─── Events ──────────────────────────────────────────────────────────────────

/// An event that has not yet been sealed into the chain.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
  pub subject_id: SubjectId,
  pub action:     AuditAction,
  pub actor:      String,
  pub details:    AuditDetails,
}

impl NewAuditEvent {
  pub fn new(
    subject_id: SubjectId,
    action: AuditAction,
    actor: impl Into<String>,
  ) -> Self {
    Self { subject_id, action, actor: actor.into(), details: AuditDetails::new() }
  }

  pub fn with(
    mut self,
    key: impl Into<String>,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    self.details.insert(key.into(), value.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
  pub event_id:   Uuid,
  /// Position in the chain, starting at 1 with no gaps.
  pub sequence:   u64,
  pub subject_id: SubjectId,
  pub action:     AuditAction,
  pub actor:      String,
  pub timestamp:  DateTime<Utc>,
  pub details:    AuditDetails,
  pub prev_hash:  String,
  pub hash:       String,
}

impl AuditEvent {
  /// Seal `event` as the successor of `head`.
  pub fn seal(event: NewAuditEvent, head: &ChainHead, timestamp: DateTime<Utc>) -> Self {
    let mut sealed = Self {
      event_id: Uuid::new_v4(),
      sequence: head.sequence + 1,
      subject_id: event.subject_id,
      action: event.action,
      actor: event.actor,
      timestamp,
      details: event.details,
      prev_hash: head.hash.clone(),
      hash: String::new(),
    };
    sealed.hash = sealed.compute_hash();
    sealed
  }

  /// SHA-256 over a domain tag, the predecessor's hash and every field.
  /// Variable-length fields are length-prefixed so boundaries are unambiguous.
  pub fn compute_hash(&self) -> String {
    fn field(hasher: &mut Sha256, bytes: &[u8]) {
      hasher.update((bytes.len() as u64).to_le_bytes());
      hasher.update(bytes);
    }

    let details = serde_json::to_vec(&self.details).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(HASH_DOMAIN);
    field(&mut hasher, self.prev_hash.as_bytes());
    field(&mut hasher, self.event_id.as_bytes());
    hasher.update(self.sequence.to_le_bytes());
    field(&mut hasher, self.subject_id.as_str().as_bytes());
    field(&mut hasher, self.action.as_ref().as_bytes());
    field(&mut hasher, self.actor.as_bytes());
    hasher.update(self.timestamp.timestamp_micros().to_le_bytes());
    field(&mut hasher, &details);
    hex::encode(hasher.finalize())
  }

  pub fn head(&self) -> ChainHead {
    ChainHead { sequence: self.sequence, hash: self.hash.clone() }
  }
}

// ─── Chain ───────────────────────────────────────────────────────────────────

/// The position and hash of the most recent event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
  pub sequence: u64,
  pub hash:     String,
}

impl ChainHead {
  pub fn genesis() -> Self { Self { sequence: 0, hash: GENESIS_HASH.to_owned() } }
}

impl Default for ChainHead {
  fn default() -> Self { Self::genesis() }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
  #[error("audit chain gap: expected sequence {expected}, found {found}")]
  SequenceGap { expected: u64, found: u64 },

  #[error("audit event {sequence} does not link to its predecessor")]
  BrokenLink { sequence: u64 },

  #[error("audit event {sequence} has been altered")]
  HashMismatch { sequence: u64 },

  #[error("audit chain ends at sequence {found}, but {expected} events were written")]
  Truncated { expected: u64, found: u64 },
}

/// Walk `events` in order and check sequence continuity, predecessor links
/// and each event's own hash. Returns the head of a valid chain.
pub fn verify_chain<'a>(
  events: impl IntoIterator<Item = &'a AuditEvent>,
) -> Result<ChainHead, IntegrityError> {
  let mut head = ChainHead::genesis();
  for event in events {
    let expected = head.sequence + 1;
    if event.sequence != expected {
      return Err(IntegrityError::SequenceGap { expected, found: event.sequence });
    }
    if event.prev_hash != head.hash {
      return Err(IntegrityError::BrokenLink { sequence: event.sequence });
    }
    if event.compute_hash() != event.hash {
      return Err(IntegrityError::HashMismatch { sequence: event.sequence });
    }
    head = event.head();
  }
  Ok(head)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chain(n: usize) -> Vec<AuditEvent> {
    let mut head = ChainHead::genesis();
    let mut events = Vec::new();
    for i in 0..n {
      let event = AuditEvent::seal(
        NewAuditEvent::new("subject-1".into(), AuditAction::ConsentGranted, "tester")
          .with("purpose", "marketing")
          .with("index", i as u64),
        &head,
        Utc::now(),
      );
      head = event.head();
      events.push(event);
    }
    events
  }

  #[test]
  fn sealed_chain_verifies() {
    let events = chain(5);
    let head = verify_chain(&events).unwrap();
    assert_eq!(head.sequence, 5);
    assert_eq!(head.hash, events[4].hash);
    assert_eq!(events[0].prev_hash, GENESIS_HASH);
  }

  #[test]
  fn empty_chain_is_genesis() {
    let events: Vec<AuditEvent> = Vec::new();
    assert_eq!(verify_chain(&events).unwrap(), ChainHead::genesis());
  }

  #[test]
  fn altered_details_are_detected() {
    let mut events = chain(3);
    events[1]
      .details
      .insert("purpose".into(), serde_json::json!("research"));
    assert_eq!(
      verify_chain(&events),
      Err(IntegrityError::HashMismatch { sequence: 2 })
    );
  }

  #[test]
  fn removed_event_is_detected() {
    let mut events = chain(4);
    events.remove(2);
    assert_eq!(
      verify_chain(&events),
      Err(IntegrityError::SequenceGap { expected: 3, found: 4 })
    );
  }

  #[test]
  fn rehashed_forgery_breaks_the_next_link() {
    let mut events = chain(3);
    events[1].actor = "mallory".into();
    events[1].hash = events[1].compute_hash();
    assert_eq!(
      verify_chain(&events),
      Err(IntegrityError::BrokenLink { sequence: 3 })
    );
  }

  #[test]
  fn action_round_trips_through_its_string_form() {
    let action = AuditAction::DeletionBlockedLegalHold;
    assert_eq!(action.as_ref(), "DELETION_BLOCKED_LEGAL_HOLD");
    assert_eq!(AuditAction::parse(action.as_ref()).unwrap(), action);
    assert!(AuditAction::parse("DELETE_AUDIT_LOG").is_err());
  }
}
