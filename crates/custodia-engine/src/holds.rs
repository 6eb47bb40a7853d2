//! Subjects currently exempt from deletion.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use custodia_core::{
  audit::{AuditAction, AuditEvent, NewAuditEvent},
  hold::LegalHold,
  store::AuditSink,
  subject::{Actor, SubjectId},
};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  audit_log::AuditLog,
  error::{Error, Result},
};

pub struct LegalHoldRegistry<A> {
  audit:  Arc<AuditLog<A>>,
  active: RwLock<HashMap<SubjectId, LegalHold>>,
}

impl<A: AuditSink> LegalHoldRegistry<A> {
  pub fn new(audit: Arc<AuditLog<A>>) -> Self {
    Self { audit, active: RwLock::new(HashMap::new()) }
  }

  pub async fn active_hold(&self, subject_id: &SubjectId) -> Option<LegalHold> {
    self.active.read().await.get(subject_id).cloned()
  }

  pub async fn place_hold(
    &self,
    subject_id: &SubjectId,
    reason: &str,
    actor: &Actor,
  ) -> Result<LegalHold> {
    // The write lock is held across the audit append so two placements for
    // the same subject cannot both succeed.
    let mut active = self.active.write().await;
    if active.contains_key(subject_id) {
      return Err(Error::HoldAlreadyActive(subject_id.clone()));
    }

    let hold = LegalHold::new(subject_id.clone(), reason, &actor.name, Utc::now());
    self
      .audit
      .append(
        NewAuditEvent::new(subject_id.clone(), AuditAction::LegalHoldPlaced, &actor.name)
          .with("hold_id", hold.hold_id.to_string())
          .with("reason", reason),
      )
      .await?;

    active.insert(subject_id.clone(), hold.clone());
    info!(subject = %subject_id, actor = %actor.name, "legal hold placed");
    Ok(hold)
  }

  pub async fn release_hold(
    &self,
    subject_id: &SubjectId,
    actor: &Actor,
  ) -> Result<LegalHold> {
    let mut active = self.active.write().await;
    let Some(hold) = active.get(subject_id) else {
      return Err(Error::NoActiveHold(subject_id.clone()));
    };

    self
      .audit
      .append(
        NewAuditEvent::new(subject_id.clone(), AuditAction::LegalHoldReleased, &actor.name)
          .with("hold_id", hold.hold_id.to_string())
          .with("reason", hold.reason.as_str()),
      )
      .await?;

    let mut released = active
      .remove(subject_id)
      .ok_or_else(|| Error::NoActiveHold(subject_id.clone()))?;
    released.released_at = Some(Utc::now());
    released.released_by = Some(actor.name.clone());
    info!(subject = %subject_id, actor = %actor.name, "legal hold released");
    Ok(released)
  }

  /// Rebuild the active set from a verified chain.
  pub async fn replay(&self, events: &[AuditEvent]) {
    let mut active = self.active.write().await;
    active.clear();
    for event in events {
      match event.action {
        AuditAction::LegalHoldPlaced => {
          let reason = event
            .details
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
          let mut hold =
            LegalHold::new(event.subject_id.clone(), reason, &event.actor, event.timestamp);
          if let Some(id) = event
            .details
            .get("hold_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
          {
            hold.hold_id = id;
          }
          active.insert(event.subject_id.clone(), hold);
        }
        AuditAction::LegalHoldReleased => {
          active.remove(&event.subject_id);
        }
        _ => {}
      }
    }
    debug!(holds = active.len(), "replayed legal holds");
  }
}
