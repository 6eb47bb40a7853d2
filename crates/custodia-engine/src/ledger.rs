//! Current consent per (subject, purpose), backed by the audit trail.
//!
//! The audit log is the source of truth. The in-memory projection only ever
//! moves after the corresponding event has been persisted, and is rebuilt
//! from the log by [`ConsentLedger::replay`] on startup.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use custodia_core::{
  audit::{AuditAction, AuditEvent, NewAuditEvent},
  consent::{ConsentPurpose, ConsentRecord, ConsentState, ConsentTransition, Transition},
  store::AuditSink,
  subject::{Actor, SubjectId},
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{audit_log::AuditLog, error::Result, sync::KeyedMutex};

type Key = (SubjectId, ConsentPurpose);

pub struct ConsentLedger<A> {
  audit:          Arc<AuditLog<A>>,
  records:        RwLock<HashMap<Key, ConsentRecord>>,
  writers:        KeyedMutex<Key>,
  policy_version: String,
}

impl<A: AuditSink> ConsentLedger<A> {
  pub fn new(audit: Arc<AuditLog<A>>, policy_version: impl Into<String>) -> Self {
    Self {
      audit,
      records: RwLock::new(HashMap::new()),
      writers: KeyedMutex::new(),
      policy_version: policy_version.into(),
    }
  }

  /// Apply a consent change and return the resulting projection.
  ///
  /// No-op changes (repeating the current state, withdrawing something never
  /// granted) are still audited with `noop = true`.
  pub async fn record_consent(
    &self,
    subject_id: &SubjectId,
    purpose: &ConsentPurpose,
    state: ConsentState,
    actor: &Actor,
  ) -> Result<ConsentRecord> {
    let key = (subject_id.clone(), purpose.clone());
    let _writer = self.writers.lock(key.clone()).await;

    let now = Utc::now();
    let current = self.records.read().await.get(&key).cloned().unwrap_or_else(|| {
      ConsentRecord::unset(subject_id.clone(), purpose.clone(), &self.policy_version, now)
    });

    let transition = current.state.transition_to(state)?;
    let noop = transition == Transition::Noop;
    let action = match state {
      ConsentState::Granted => AuditAction::ConsentGranted,
      _ => AuditAction::ConsentWithdrawn,
    };

    self
      .audit
      .append(
        NewAuditEvent::new(subject_id.clone(), action, &actor.name)
          .with("purpose", purpose.as_str())
          .with("from", current.state.to_string())
          .with("to", state.to_string())
          .with("noop", noop)
          .with("policy_version", self.policy_version.as_str()),
      )
      .await?;

    if noop {
      debug!(subject = %subject_id, %purpose, %state, "consent unchanged");
      return Ok(current);
    }

    let next = current.apply(state, &self.policy_version, now);
    self.records.write().await.insert(key, next.clone());
    info!(subject = %subject_id, %purpose, from = %current.state, to = %state, "consent updated");
    Ok(next)
  }

  pub async fn current_state(
    &self,
    subject_id: &SubjectId,
    purpose: &ConsentPurpose,
  ) -> ConsentState {
    self
      .records
      .read()
      .await
      .get(&(subject_id.clone(), purpose.clone()))
      .map_or(ConsentState::Unset, |r| r.state)
  }

  /// Every purpose the subject has a recorded consent for, ordered by purpose.
  pub async fn consents_for(&self, subject_id: &SubjectId) -> Vec<ConsentRecord> {
    let records = self.records.read().await;
    let mut out: Vec<_> = records
      .iter()
      .filter(|((subject, _), _)| subject == subject_id)
      .map(|(_, record)| record.clone())
      .collect();
    out.sort_by(|a, b| a.purpose.cmp(&b.purpose));
    out
  }

  /// Every consent change for one purpose, oldest first, read from the audit
  /// trail.
  pub async fn history(
    &self,
    subject_id: &SubjectId,
    purpose: &ConsentPurpose,
  ) -> Result<Vec<ConsentTransition>> {
    let events = self.audit.events_for(subject_id).await?;
    Ok(
      events
        .iter()
        .filter_map(transition_from_event)
        .filter(|t| &t.purpose == purpose)
        .collect(),
    )
  }

  /// Rebuild the projection from a verified chain.
  pub async fn replay(&self, events: &[AuditEvent]) {
    let mut records = self.records.write().await;
    records.clear();
    for event in events {
      let Some(t) = transition_from_event(event) else { continue };
      if t.noop {
        continue;
      }
      let key = (event.subject_id.clone(), t.purpose.clone());
      let current = records.get(&key).cloned().unwrap_or_else(|| {
        ConsentRecord::unset(event.subject_id.clone(), t.purpose.clone(), &t.policy_version, t.at)
      });
      records.insert(key, current.apply(t.to, &t.policy_version, t.at));
    }
    debug!(consents = records.len(), "replayed consent ledger");
  }
}

fn transition_from_event(event: &AuditEvent) -> Option<ConsentTransition> {
  if !matches!(
    event.action,
    AuditAction::ConsentGranted | AuditAction::ConsentWithdrawn
  ) {
    return None;
  }
  let text = |key: &str| event.details.get(key).and_then(|v| v.as_str());
  let state = |key: &str| text(key).and_then(|s| s.parse::<ConsentState>().ok());

  let (Some(purpose), Some(from), Some(to)) = (text("purpose"), state("from"), state("to"))
  else {
    warn!(sequence = event.sequence, "consent event with malformed details");
    return None;
  };
  Some(ConsentTransition {
    purpose: ConsentPurpose::parse(purpose),
    from,
    to,
    noop: event
      .details
      .get("noop")
      .and_then(|v| v.as_bool())
      .unwrap_or(false),
    policy_version: text("policy_version").unwrap_or_default().to_owned(),
    actor: event.actor.clone(),
    at: event.timestamp,
  })
}
