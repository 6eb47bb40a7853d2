//! Consent change → downstream actions.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use custodia_core::{
  audit::{AuditAction, NewAuditEvent},
  consent::{ActionPlan, ConsentAction, ConsentPurpose, ConsentState, DispatchedAction},
  store::{ActionNotifier, AuditSink, NotifyError},
  subject::{Actor, SubjectId},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{audit_log::AuditLog, error::Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
  pub triggered_actions: Vec<ConsentAction>,
  /// The purpose had no action mapping.
  pub policy_gap:        bool,
  /// The `CONSENT_ACTION_DISPATCHED` event recording the intent.
  pub event_id:          Uuid,
}

pub struct ConsentEffectDispatcher<A> {
  audit:    Arc<AuditLog<A>>,
  notifier: Arc<dyn ActionNotifier>,
  gaps:     AtomicU64,
}

impl<A: AuditSink> ConsentEffectDispatcher<A> {
  pub fn new(audit: Arc<AuditLog<A>>, notifier: Arc<dyn ActionNotifier>) -> Self {
    Self { audit, notifier, gaps: AtomicU64::new(0) }
  }

  /// Record the intent, then hand each action to the notifier.
  ///
  /// Exactly one audit event is written per call. Notifier failures are
  /// logged and do not affect the outcome.
  pub async fn dispatch(
    &self,
    subject_id: &SubjectId,
    purpose: &ConsentPurpose,
    state: ConsentState,
    actor: &Actor,
  ) -> Result<DispatchOutcome> {
    let plan = purpose.actions_for(state);
    let policy_gap = plan == ActionPlan::PolicyGap;
    if policy_gap {
      self.gaps.fetch_add(1, Ordering::Relaxed);
      warn!(subject = %subject_id, %purpose, "no consent actions defined for purpose");
    }
    let actions = plan.actions();

    let event = self
      .audit
      .append(
        NewAuditEvent::new(
          subject_id.clone(),
          AuditAction::ConsentActionDispatched,
          &actor.name,
        )
        .with("purpose", purpose.as_str())
        .with("state", state.to_string())
        .with(
          "triggered_actions",
          actions.iter().map(ToString::to_string).collect::<Vec<_>>(),
        )
        .with("policy_gap", policy_gap),
      )
      .await?;

    for action in actions {
      let message = DispatchedAction {
        subject_id: subject_id.clone(),
        purpose:    purpose.clone(),
        action:     *action,
        event_id:   event.event_id,
      };
      if let Err(e) = self.notifier.notify(&message) {
        warn!(subject = %subject_id, %action, "action notification failed: {e}");
      }
    }

    info!(subject = %subject_id, %purpose, actions = actions.len(), "consent actions dispatched");
    Ok(DispatchOutcome {
      triggered_actions: actions.to_vec(),
      policy_gap,
      event_id: event.event_id,
    })
  }

  /// Dispatches for purposes with no action mapping.
  pub fn policy_gaps(&self) -> u64 { self.gaps.load(Ordering::Relaxed) }
}

// ─── Notifiers ───────────────────────────────────────────────────────────────

/// Logs each action and does nothing else. The default notifier when no
/// downstream integration is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ActionNotifier for LogNotifier {
  fn notify(&self, action: &DispatchedAction) -> Result<(), NotifyError> {
    info!(
      subject = %action.subject_id,
      purpose = %action.purpose,
      action = %action.action,
      event = %action.event_id,
      "consent action"
    );
    Ok(())
  }
}
