//! Subject data export, plain or anonymised.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::Utc;
use custodia_core::{
  audit::{AuditAction, NewAuditEvent},
  category::DataCategory,
  export::{ExportBundle, ExportFormat, ExportMetadata, ExportedRecord, RetentionPeriod},
  record::{REDACTION_MARKER, redact_identifiers},
  retention::RetentionPolicyTable,
  store::{AuditSink, RecordStore},
  subject::{Actor, SubjectId},
};
use tracing::info;

use crate::{
  audit_log::AuditLog,
  error::{Error, Result},
  ledger::ConsentLedger,
  sync::bounded,
};

pub struct ExportService<R, A> {
  store:    Arc<R>,
  audit:    Arc<AuditLog<A>>,
  ledger:   Arc<ConsentLedger<A>>,
  policies: Arc<RetentionPolicyTable>,
  timeout:  Duration,
}

impl<R: RecordStore, A: AuditSink> ExportService<R, A> {
  pub fn new(
    store: Arc<R>,
    audit: Arc<AuditLog<A>>,
    ledger: Arc<ConsentLedger<A>>,
    policies: Arc<RetentionPolicyTable>,
    timeout: Duration,
  ) -> Self {
    Self { store, audit, ledger, policies, timeout }
  }

  pub async fn export_subject(
    &self,
    subject_id: &SubjectId,
    actor: &Actor,
  ) -> Result<ExportBundle> {
    self.export(subject_id, false, actor).await
  }

  pub async fn export_anonymized(
    &self,
    subject_id: &SubjectId,
    actor: &Actor,
  ) -> Result<ExportBundle> {
    self.export(subject_id, true, actor).await
  }

  /// Exports are allowed under a legal hold. The request is audited whether
  /// or not it succeeds.
  async fn export(
    &self,
    subject_id: &SubjectId,
    anonymize: bool,
    actor: &Actor,
  ) -> Result<ExportBundle> {
    let result = self.assemble(subject_id, anonymize).await;

    let mut event =
      NewAuditEvent::new(subject_id.clone(), AuditAction::DataExportRequest, &actor.name)
        .with("anonymized", anonymize);
    event = match &result {
      Ok(bundle) => event
        .with("outcome", "success")
        .with("record_count", bundle.metadata.record_count)
        .with(
          "data_categories",
          bundle
            .metadata
            .data_categories
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        ),
      Err(e) => event.with("outcome", "failure").with("error", e.to_string()),
    };
    self.audit.append(event).await?;

    if let Ok(bundle) = &result {
      info!(
        subject = %subject_id,
        anonymize,
        records = bundle.metadata.record_count,
        "subject data exported"
      );
    }
    result
  }

  async fn assemble(&self, subject_id: &SubjectId, anonymize: bool) -> Result<ExportBundle> {
    if !bounded(self.timeout, self.store.subject_exists(subject_id)).await? {
      return Err(Error::SubjectNotFound(subject_id.clone()));
    }

    let mut profile = None;
    let mut sections = BTreeMap::new();
    let mut retention_periods = BTreeMap::new();
    let mut record_count = 0;

    for category in DataCategory::all() {
      let records = bounded(self.timeout, self.store.list_records(subject_id, category)).await?;
      if records.is_empty() {
        continue;
      }
      record_count += records.len();

      let policy = self.policies.policy_for(category);
      retention_periods.insert(category, RetentionPeriod {
        retention_days: policy.retention_days,
        legal_basis:    policy.legal_basis,
      });

      let mut exported: Vec<ExportedRecord> =
        records.into_iter().map(ExportedRecord::from).collect();
      if anonymize {
        for record in &mut exported {
          redact_identifiers(&mut record.fields);
        }
      }
      if category == DataCategory::Profiles && profile.is_none() {
        profile = exported.first().map(|r| r.fields.clone());
      }
      sections.insert(category, exported);
    }

    let mut consents = self.ledger.consents_for(subject_id).await;
    if anonymize {
      for consent in &mut consents {
        consent.subject_id = SubjectId::new(REDACTION_MARKER);
      }
    }

    Ok(ExportBundle {
      subject_id: (!anonymize).then(|| subject_id.clone()),
      profile,
      metadata: ExportMetadata {
        exported_at: Utc::now(),
        format: ExportFormat::Json,
        data_categories: sections.keys().copied().collect(),
        retention_periods,
        anonymized: anonymize,
        record_count,
      },
      sections,
      consents,
    })
  }
}
