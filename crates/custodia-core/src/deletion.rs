//! Deletion requests and their per-category summaries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{category::DataCategory, subject::SubjectId};

// ─── Status ──────────────────────────────────────────────────────────────────

/// `pending → blocked`, or `pending → in_progress → completed |
/// partially_completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStatus {
  Pending,
  InProgress,
  PartiallyCompleted,
  Completed,
  Blocked,
}

impl DeletionStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::PartiallyCompleted | Self::Blocked)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::InProgress => "in_progress",
      Self::PartiallyCompleted => "partially_completed",
      Self::Completed => "completed",
      Self::Blocked => "blocked",
    }
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Why records (or a whole category) were left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
  /// Audit records are kept regardless of the request.
  AuditRetentionMandatory,
  RetentionNotElapsed,
  LegalHold,
  /// Retained under the fallback policy because the category has no entry.
  PolicyGap,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCategory {
  pub category: DataCategory,
  pub reason:   SkipReason,
  /// Records left in place for this reason; zero when the whole category was
  /// skipped before any record was looked at.
  pub records:  u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub detail:   Option<String>,
}

/// What happened to one category's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOutcome {
  pub deleted:    u64,
  pub anonymized: u64,
  pub retained:   u64,
}

impl CategoryOutcome {
  /// Records erased, by either deletion or anonymisation.
  pub fn processed(&self) -> u64 { self.deleted + self.anonymized }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSummary {
  pub categories:          BTreeMap<DataCategory, CategoryOutcome>,
  pub skipped:             Vec<SkippedCategory>,
  /// Records still referencing the subject that were neither erased nor
  /// skipped with a reason. Always zero for a completed request.
  pub orphaned_records:    u64,
  /// Audit logs are never erased; this is always `true`.
  pub audit_logs_excluded: bool,
}

impl Default for DeletionSummary {
  fn default() -> Self {
    Self {
      categories:          BTreeMap::new(),
      skipped:             Vec::new(),
      orphaned_records:    0,
      audit_logs_excluded: true,
    }
  }
}

impl DeletionSummary {
  pub fn record(&mut self, category: DataCategory, outcome: CategoryOutcome) {
    self.categories.insert(category, outcome);
  }

  pub fn skip(
    &mut self,
    category: DataCategory,
    reason: SkipReason,
    records: u64,
    detail: Option<String>,
  ) {
    self.skipped.push(SkippedCategory { category, reason, records, detail });
  }

  /// Erased record counts per category.
  pub fn counts(&self) -> BTreeMap<DataCategory, u64> {
    self
      .categories
      .iter()
      .map(|(category, outcome)| (*category, outcome.processed()))
      .collect()
  }

  pub fn total_processed(&self) -> u64 {
    self.categories.values().map(CategoryOutcome::processed).sum()
  }

  pub fn skipped_for(
    &self,
    category: DataCategory,
  ) -> impl Iterator<Item = &SkippedCategory> + '_ {
    self.skipped.iter().filter(move |s| s.category == category)
  }

  pub fn has_skip(&self, reason: SkipReason) -> bool {
    self.skipped.iter().any(|s| s.reason == reason)
  }

  /// `completed` unless some category failed or was cut short by a hold.
  pub fn resolve_status(&self) -> DeletionStatus {
    if self.has_skip(SkipReason::Error) || self.has_skip(SkipReason::LegalHold) {
      DeletionStatus::PartiallyCompleted
    } else {
      DeletionStatus::Completed
    }
  }
}

// ─── Request ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRequest {
  pub request_id:           Uuid,
  pub subject_id:           SubjectId,
  pub requested_at:         DateTime<Utc>,
  pub requested_by:         String,
  /// `None` means every category the subject has records in.
  pub categories_requested: Option<Vec<DataCategory>>,
  pub status:               DeletionStatus,
  pub deletion_allowed:     bool,
  pub hold_reason:          Option<String>,
  pub summary:              Option<DeletionSummary>,
  pub completed_at:         Option<DateTime<Utc>>,
  /// Set when the request finished without its outcome reaching the audit
  /// trail.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:                Option<String>,
}

impl DeletionRequest {
  pub fn new(
    subject_id: SubjectId,
    requested_by: impl Into<String>,
    categories_requested: Option<Vec<DataCategory>>,
    requested_at: DateTime<Utc>,
  ) -> Self {
    Self {
      request_id: Uuid::new_v4(),
      subject_id,
      requested_at,
      requested_by: requested_by.into(),
      categories_requested,
      status: DeletionStatus::Pending,
      deletion_allowed: true,
      hold_reason: None,
      summary: None,
      completed_at: None,
      error: None,
    }
  }

  pub fn block(
    &mut self,
    hold_reason: String,
    summary: DeletionSummary,
    at: DateTime<Utc>,
  ) {
    self.status = DeletionStatus::Blocked;
    self.deletion_allowed = false;
    self.hold_reason = Some(hold_reason);
    self.summary = Some(summary);
    self.completed_at = Some(at);
  }

  pub fn finish(&mut self, summary: DeletionSummary, at: DateTime<Utc>) {
    self.status = summary.resolve_status();
    self.summary = Some(summary);
    self.completed_at = Some(at);
  }

  /// Erasure ran but its outcome could not be audited. Never reported as
  /// `completed`.
  pub fn fail_unaudited(&mut self, error: impl Into<String>) {
    self.status = DeletionStatus::PartiallyCompleted;
    self.error = Some(error.into());
  }
}
