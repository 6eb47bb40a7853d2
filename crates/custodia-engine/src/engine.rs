//! The [`ComplianceEngine`] facade: one explicitly constructed value wiring
//! every component to the injected store, sink and notifier.

use std::sync::Arc;

use custodia_core::{
  audit::AuditEvent,
  consent::{ConsentAction, ConsentPurpose, ConsentRecord, ConsentState, ConsentTransition},
  deletion::DeletionRequest,
  export::ExportBundle,
  hold::LegalHold,
  retention::{RetentionPolicy, RetentionPolicyTable},
  store::{ActionNotifier, AuditSink, RecordStore},
  subject::{Actor, SubjectId},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  audit_log::{AuditLog, IntegrityReport},
  config::EngineConfig,
  dispatcher::ConsentEffectDispatcher,
  error::Result,
  export::ExportService,
  holds::LegalHoldRegistry,
  ledger::ConsentLedger,
  orchestrator::{DeletionOrchestrator, DeletionParams},
};

/// Result of [`ComplianceEngine::set_consent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentChange {
  pub record:            ConsentRecord,
  pub triggered_actions: Vec<ConsentAction>,
}

pub struct ComplianceEngine<R, A> {
  audit:        Arc<AuditLog<A>>,
  ledger:       Arc<ConsentLedger<A>>,
  holds:        Arc<LegalHoldRegistry<A>>,
  policies:     Arc<RetentionPolicyTable>,
  dispatcher:   ConsentEffectDispatcher<A>,
  orchestrator: DeletionOrchestrator<R, A>,
  exports:      ExportService<R, A>,
}

impl<R: RecordStore, A: AuditSink> ComplianceEngine<R, A> {
  pub fn new(
    store: R,
    sink: A,
    notifier: Arc<dyn ActionNotifier>,
    policies: RetentionPolicyTable,
    config: EngineConfig,
  ) -> Self {
    let store = Arc::new(store);
    let audit = Arc::new(AuditLog::new(sink));
    let policies = Arc::new(policies);
    let ledger = Arc::new(ConsentLedger::new(audit.clone(), config.policy_version));
    let holds = Arc::new(LegalHoldRegistry::new(audit.clone()));

    Self {
      dispatcher: ConsentEffectDispatcher::new(audit.clone(), notifier),
      orchestrator: DeletionOrchestrator::new(
        store.clone(),
        audit.clone(),
        holds.clone(),
        policies.clone(),
        config.store_timeout,
        config.request_retention,
      ),
      exports: ExportService::new(
        store,
        audit.clone(),
        ledger.clone(),
        policies.clone(),
        config.store_timeout,
      ),
      audit,
      ledger,
      holds,
      policies,
    }
  }

  // ─── Lifecycle ────────────────────────────────────────────────────────────

  /// Verify the persisted audit chain and rebuild the consent and legal-hold
  /// projections from it. Must run before serving requests.
  pub async fn init(&self) -> Result<()> {
    let events = self.audit.recover().await?;
    self.ledger.replay(&events).await;
    self.holds.replay(&events).await;

    let missing = self.policies.missing_categories();
    if !missing.is_empty() {
      warn!(?missing, "retention table has no entry for some categories");
    }
    info!(events = events.len(), "compliance engine initialised");
    Ok(())
  }

  pub async fn shutdown(&self) -> Result<()> {
    self.audit.flush().await?;
    info!("compliance engine shut down");
    Ok(())
  }

  // ─── Requests ─────────────────────────────────────────────────────────────

  /// Record a consent change, then dispatch its downstream actions. The
  /// dispatcher runs for no-op changes too so every request leaves a trace.
  pub async fn set_consent(
    &self,
    subject_id: &SubjectId,
    purpose: &ConsentPurpose,
    state: ConsentState,
    actor: &Actor,
  ) -> Result<ConsentChange> {
    let record = self
      .ledger
      .record_consent(subject_id, purpose, state, actor)
      .await?;
    let outcome = self
      .dispatcher
      .dispatch(subject_id, purpose, state, actor)
      .await?;
    Ok(ConsentChange { record, triggered_actions: outcome.triggered_actions })
  }

  pub async fn request_deletion(&self, params: DeletionParams) -> Result<DeletionRequest> {
    self.orchestrator.request_deletion(params).await
  }

  pub async fn deletion_status(&self, request_id: Uuid) -> Result<DeletionRequest> {
    self.orchestrator.deletion_status(request_id).await
  }

  pub async fn request_export(
    &self,
    subject_id: &SubjectId,
    anonymize: bool,
    actor: &Actor,
  ) -> Result<ExportBundle> {
    if anonymize {
      self.exports.export_anonymized(subject_id, actor).await
    } else {
      self.exports.export_subject(subject_id, actor).await
    }
  }

  // ─── Legal holds ──────────────────────────────────────────────────────────

  pub async fn place_hold(
    &self,
    subject_id: &SubjectId,
    reason: &str,
    actor: &Actor,
  ) -> Result<LegalHold> {
    self.holds.place_hold(subject_id, reason, actor).await
  }

  pub async fn release_hold(&self, subject_id: &SubjectId, actor: &Actor) -> Result<LegalHold> {
    self.holds.release_hold(subject_id, actor).await
  }

  pub async fn active_hold(&self, subject_id: &SubjectId) -> Option<LegalHold> {
    self.holds.active_hold(subject_id).await
  }

  // ─── Reads ────────────────────────────────────────────────────────────────

  pub async fn consents(&self, subject_id: &SubjectId) -> Vec<ConsentRecord> {
    self.ledger.consents_for(subject_id).await
  }

  pub async fn consent_state(
    &self,
    subject_id: &SubjectId,
    purpose: &ConsentPurpose,
  ) -> ConsentState {
    self.ledger.current_state(subject_id, purpose).await
  }

  pub async fn consent_history(
    &self,
    subject_id: &SubjectId,
    purpose: &ConsentPurpose,
  ) -> Result<Vec<ConsentTransition>> {
    self.ledger.history(subject_id, purpose).await
  }

  pub async fn audit_trail(&self, subject_id: &SubjectId) -> Result<Vec<AuditEvent>> {
    self.audit.events_for(subject_id).await
  }

  pub async fn verify_audit_trail(&self) -> Result<IntegrityReport> {
    self.audit.verify().await
  }

  pub fn policies(&self) -> Vec<RetentionPolicy> { self.policies.policies() }

  /// Retention fallbacks plus unmapped consent purposes since startup.
  pub fn policy_gaps(&self) -> u64 {
    self.policies.policy_gaps() + self.dispatcher.policy_gaps()
  }
}
