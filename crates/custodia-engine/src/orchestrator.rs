//! Cascading right-to-erasure.
//!
//! A request walks `pending → blocked` when the subject is under a legal hold,
//! or `pending → in_progress → completed | partially_completed` otherwise.
//! Category-level failures are recorded in the summary and never abort the
//! request. Subject-level failures (unknown subject, concurrent request,
//! audit write) are returned as errors.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
  time::Duration,
};

use chrono::Utc;
use custodia_core::{
  audit::{AuditAction, NewAuditEvent},
  category::DataCategory,
  deletion::{
    CategoryOutcome, DeletionRequest, DeletionStatus, DeletionSummary, SkipReason,
  },
  record::identifier_fields,
  retention::{ErasureMode, ResolvedPolicy, RetentionPolicyTable},
  store::{AuditSink, RecordStore},
  subject::{Actor, SubjectId},
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  audit_log::AuditLog,
  error::{Error, Result},
  holds::LegalHoldRegistry,
  sync::{InFlight, bounded},
};

/// Inputs to [`DeletionOrchestrator::request_deletion`].
#[derive(Debug, Clone)]
pub struct DeletionParams {
  pub subject_id:   SubjectId,
  /// `None` means every category the subject has records in.
  pub categories:   Option<Vec<DataCategory>>,
  pub requested_by: Actor,
  /// Bound on each record store call. Falls back to the engine default.
  pub timeout:      Option<Duration>,
}

impl DeletionParams {
  pub fn new(subject_id: SubjectId, requested_by: Actor) -> Self {
    Self { subject_id, categories: None, requested_by, timeout: None }
  }

  pub fn categories(mut self, categories: impl IntoIterator<Item = DataCategory>) -> Self {
    self.categories = Some(categories.into_iter().collect());
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }
}

pub struct DeletionOrchestrator<R, A> {
  store:             Arc<R>,
  audit:             Arc<AuditLog<A>>,
  holds:             Arc<LegalHoldRegistry<A>>,
  policies:          Arc<RetentionPolicyTable>,
  requests:          RwLock<HashMap<Uuid, DeletionRequest>>,
  in_flight:         InFlight<SubjectId>,
  default_timeout:   Duration,
  request_retention: Duration,
}

impl<R: RecordStore, A: AuditSink> DeletionOrchestrator<R, A> {
  pub fn new(
    store: Arc<R>,
    audit: Arc<AuditLog<A>>,
    holds: Arc<LegalHoldRegistry<A>>,
    policies: Arc<RetentionPolicyTable>,
    default_timeout: Duration,
    request_retention: Duration,
  ) -> Self {
    Self {
      store,
      audit,
      holds,
      policies,
      requests: RwLock::new(HashMap::new()),
      in_flight: InFlight::new(),
      default_timeout,
      request_retention,
    }
  }

  pub async fn request_deletion(&self, params: DeletionParams) -> Result<DeletionRequest> {
    let subject = &params.subject_id;
    let actor = &params.requested_by;
    let _claim = self
      .in_flight
      .try_claim(subject.clone())
      .ok_or_else(|| Error::ConcurrentRequest(subject.clone()))?;
    let timeout = params.timeout.unwrap_or(self.default_timeout);

    if !bounded(timeout, self.store.subject_exists(subject)).await? {
      return Err(Error::SubjectNotFound(subject.clone()));
    }

    let mut request = DeletionRequest::new(
      subject.clone(),
      &actor.name,
      params.categories.clone(),
      Utc::now(),
    );

    if let Some(hold) = self.holds.active_hold(subject).await {
      let mut summary = DeletionSummary::default();
      for category in requested_or_all(params.categories.as_deref()) {
        summary.skip(category, SkipReason::LegalHold, 0, Some(hold.reason.clone()));
      }
      self
        .audit
        .append(
          NewAuditEvent::new(
            subject.clone(),
            AuditAction::DeletionBlockedLegalHold,
            &actor.name,
          )
          .with("request_id", request.request_id.to_string())
          .with("hold_id", hold.hold_id.to_string())
          .with("hold_reason", hold.reason.as_str()),
        )
        .await?;
      request.block(hold.reason, summary, Utc::now());
      self.track(&request).await;
      info!(subject = %subject, request = %request.request_id, "deletion blocked by legal hold");
      return Ok(request);
    }

    let categories = requested_or_all(params.categories.as_deref());
    self
      .audit
      .append(
        NewAuditEvent::new(subject.clone(), AuditAction::DeletionStarted, &actor.name)
          .with("request_id", request.request_id.to_string())
          .with(
            "categories",
            categories.iter().map(ToString::to_string).collect::<Vec<_>>(),
          ),
      )
      .await?;
    request.status = DeletionStatus::InProgress;
    self.track(&request).await;

    let explicit = params.categories.is_some();
    let mut summary = DeletionSummary::default();
    for category in categories {
      if let Some(hold) = self.holds.active_hold(subject).await {
        warn!(subject = %subject, %category, "legal hold placed during deletion");
        summary.skip(category, SkipReason::LegalHold, 0, Some(hold.reason));
        continue;
      }
      self
        .process_category(subject, category, explicit, timeout, &mut summary)
        .await;
    }

    request.finish(summary, Utc::now());

    // The finished state only becomes visible once its audit event is durable.
    let processed = match serde_json::to_value(&request.summary) {
      Ok(summary_json) => {
        self
          .audit
          .append(
            NewAuditEvent::new(subject.clone(), AuditAction::DeletionProcessed, &actor.name)
              .with("request_id", request.request_id.to_string())
              .with("status", request.status.as_str())
              .with("summary", summary_json),
          )
          .await
      }
      Err(e) => Err(e.into()),
    };
    if let Err(e) = processed {
      request.fail_unaudited(format!("outcome not audited: {e}"));
      self.track(&request).await;
      return Err(e);
    }
    self.track(&request).await;

    info!(
      subject = %subject,
      request = %request.request_id,
      status = request.status.as_str(),
      "deletion processed"
    );
    Ok(request)
  }

  pub async fn deletion_status(&self, request_id: Uuid) -> Result<DeletionRequest> {
    self
      .requests
      .read()
      .await
      .get(&request_id)
      .cloned()
      .ok_or(Error::RequestNotFound(request_id))
  }

  /// Record the latest state of `request`, dropping finished requests older
  /// than the retention window.
  async fn track(&self, request: &DeletionRequest) {
    let now = Utc::now();
    let retention = self.request_retention;
    let mut requests = self.requests.write().await;
    requests.retain(|id, tracked| {
      *id == request.request_id
        || !tracked.status.is_terminal()
        || tracked
          .completed_at
          .and_then(|at| (now - at).to_std().ok())
          .is_none_or(|age| age < retention)
    });
    requests.insert(request.request_id, request.clone());
  }

  async fn process_category(
    &self,
    subject: &SubjectId,
    category: DataCategory,
    explicit: bool,
    timeout: Duration,
    summary: &mut DeletionSummary,
  ) {
    let listed = bounded(timeout, self.store.list_records(subject, category)).await;

    if category.is_audit() {
      let count = listed.as_ref().map_or(0, |records| records.len() as u64);
      summary.skip(category, SkipReason::AuditRetentionMandatory, count, None);
      return;
    }

    let records = match listed {
      Ok(records) => records,
      Err(e) => {
        warn!(subject = %subject, %category, "listing records failed: {e}");
        summary.skip(category, SkipReason::Error, 0, Some(e.to_string()));
        return;
      }
    };
    if records.is_empty() && !explicit {
      return;
    }

    let resolved = self.policies.resolve(category);
    let now = Utc::now();
    let mut outcome = CategoryOutcome::default();
    let mut retained = HashSet::new();
    let mut failure = None;

    for record in &records {
      if resolved.policy.retains(record.recorded_at, now) {
        outcome.retained += 1;
        retained.insert(record.record_id);
        continue;
      }
      let erased = match resolved.policy.erasure_mode {
        ErasureMode::Delete => {
          bounded(timeout, self.store.delete_record(category, record.record_id)).await
        }
        ErasureMode::Anonymize if record.anonymized => Ok(false),
        ErasureMode::Anonymize => {
          let fields = identifier_fields(&record.fields);
          bounded(
            timeout,
            self.store.anonymize_record(category, record.record_id, &fields),
          )
          .await
        }
      };
      match erased {
        Ok(true) => match resolved.policy.erasure_mode {
          ErasureMode::Delete => outcome.deleted += 1,
          ErasureMode::Anonymize => outcome.anonymized += 1,
        },
        Ok(false) => debug!(%category, record = %record.record_id, "already erased"),
        Err(e) => {
          failure = Some(e);
          break;
        }
      }
    }

    summary.record(category, outcome);
    if outcome.retained > 0 {
      summary.skip(
        category,
        retained_reason(&resolved),
        outcome.retained,
        Some(format!(
          "{} days ({})",
          resolved.policy.retention_days, resolved.policy.legal_basis
        )),
      );
    }
    if let Some(e) = failure {
      warn!(subject = %subject, %category, "erasure failed: {e}");
      summary.skip(category, SkipReason::Error, 0, Some(e.to_string()));
      return;
    }

    match bounded(timeout, self.store.list_records(subject, category)).await {
      Ok(remaining) => {
        let orphans = remaining
          .iter()
          .filter(|r| !r.anonymized && !retained.contains(&r.record_id))
          .count() as u64;
        if orphans > 0 {
          warn!(subject = %subject, %category, orphans, "records remain after erasure");
          summary.orphaned_records += orphans;
          summary.skip(
            category,
            SkipReason::Error,
            orphans,
            Some("records remain after erasure".to_owned()),
          );
        }
      }
      Err(e) => {
        warn!(subject = %subject, %category, "verifying erasure failed: {e}");
        summary.skip(category, SkipReason::Error, 0, Some(e.to_string()));
      }
    }
  }
}

/// Requested categories in order without duplicates, or every category.
fn requested_or_all(requested: Option<&[DataCategory]>) -> Vec<DataCategory> {
  match requested {
    Some(categories) => {
      let mut seen = HashSet::new();
      categories.iter().copied().filter(|c| seen.insert(*c)).collect()
    }
    None => DataCategory::all().collect(),
  }
}

fn retained_reason(resolved: &ResolvedPolicy) -> SkipReason {
  if resolved.is_fallback {
    SkipReason::PolicyGap
  } else {
    SkipReason::RetentionNotElapsed
  }
}
