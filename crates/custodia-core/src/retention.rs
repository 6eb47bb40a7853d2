//! Retention policy table.
//!
//! Maps each [`DataCategory`] to the minimum time its records must be kept
//! and the legal basis for keeping them. The table is built once at process
//! start (from configuration or [`RetentionPolicyTable::standard`]) and never
//! mutated afterwards; only the policy-gap counter moves.

use std::{
  collections::HashMap,
  sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, category::DataCategory};

/// Retention applied to a category that has no explicit policy.
pub const FALLBACK_RETENTION_DAYS: u32 = 365;

pub const FALLBACK_LEGAL_BASIS: &str = "no explicit policy (fallback)";

// ─── Policy ──────────────────────────────────────────────────────────────────

/// What erasure means for a category once its retention window has elapsed.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErasureMode {
  /// Hard-delete the record.
  #[default]
  Delete,
  /// Keep the record but redact its direct identifiers; clinical values stay.
  Anonymize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
  pub category:       DataCategory,
  pub retention_days: u32,
  pub legal_basis:    String,
  #[serde(default)]
  pub erasure_mode:   ErasureMode,
}

impl RetentionPolicy {
  pub fn new(
    category: DataCategory,
    retention_days: u32,
    legal_basis: impl Into<String>,
    erasure_mode: ErasureMode,
  ) -> Self {
    Self {
      category,
      retention_days,
      legal_basis: legal_basis.into(),
      erasure_mode,
    }
  }

  /// The conservative policy used when a category has no entry.
  pub fn fallback(category: DataCategory) -> Self {
    Self::new(
      category,
      FALLBACK_RETENTION_DAYS,
      FALLBACK_LEGAL_BASIS,
      ErasureMode::Delete,
    )
  }

  /// `now - record_date < retention_days`. A record dated in the future is
  /// always retained.
  pub fn retains(&self, record_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(record_date)
      < Duration::days(i64::from(self.retention_days))
  }
}

/// A policy lookup result, flagging whether the fallback was used.
#[derive(Debug, Clone)]
pub struct ResolvedPolicy {
  pub policy:      RetentionPolicy,
  pub is_fallback: bool,
}

// ─── Table ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RetentionPolicyTable {
  policies: HashMap<DataCategory, RetentionPolicy>,
  gaps:     AtomicU64,
}

impl RetentionPolicyTable {
  /// Build a table from explicit entries. Each category may appear at most
  /// once; missing categories resolve to the fallback at lookup time.
  pub fn new(policies: impl IntoIterator<Item = RetentionPolicy>) -> Result<Self> {
    let mut map = HashMap::new();
    for policy in policies {
      let category = policy.category;
      if map.insert(category, policy).is_some() {
        return Err(Error::DuplicatePolicy(category));
      }
    }
    Ok(Self { policies: map, gaps: AtomicU64::new(0) })
  }

  /// The built-in table used when configuration does not supply one.
  pub fn standard() -> Self {
    use DataCategory::*;
    use ErasureMode::*;

    const CLINICAL: &str =
      "Clinical record retention (NHS Records Management Code of Practice)";

    let entries = [
      RetentionPolicy::new(
        Profiles,
        0,
        "GDPR Art. 6(1)(b) contract; erased on request",
        Delete,
      ),
      RetentionPolicy::new(MedicalRecords, 2555, CLINICAL, Anonymize),
      RetentionPolicy::new(TestResults, 2555, CLINICAL, Anonymize),
      RetentionPolicy::new(AiSummaries, 2555, CLINICAL, Anonymize),
      RetentionPolicy::new(
        Messages,
        365,
        "GDPR Art. 6(1)(f) legitimate interest (patient support)",
        Delete,
      ),
      RetentionPolicy::new(
        Appointments,
        1095,
        "GDPR Art. 6(1)(b) contract (booking history)",
        Delete,
      ),
      RetentionPolicy::new(
        MarketingData,
        730,
        "GDPR Art. 6(1)(a) consent",
        Delete,
      ),
      RetentionPolicy::new(
        SessionLogs,
        30,
        "GDPR Art. 6(1)(f) legitimate interest (security monitoring)",
        Delete,
      ),
      RetentionPolicy::new(
        AuditLogs,
        2555,
        "GDPR Art. 5(2) accountability",
        Delete,
      ),
    ];

    Self {
      policies: entries.into_iter().map(|p| (p.category, p)).collect(),
      gaps:     AtomicU64::new(0),
    }
  }

  /// Look up a category, falling back to the conservative default. Every
  /// fallback is counted and logged so the gap gets fixed.
  pub fn resolve(&self, category: DataCategory) -> ResolvedPolicy {
    match self.policies.get(&category) {
      Some(policy) => ResolvedPolicy { policy: policy.clone(), is_fallback: false },
      None => {
        let total = self.gaps.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(
          %category,
          policy_gaps = total,
          "no retention policy for category; using {FALLBACK_RETENTION_DAYS}-day fallback"
        );
        ResolvedPolicy {
          policy:      RetentionPolicy::fallback(category),
          is_fallback: true,
        }
      }
    }
  }

  pub fn policy_for(&self, category: DataCategory) -> RetentionPolicy {
    self.resolve(category).policy
  }

  /// Whether a record of `category` dated `record_date` must still be kept.
  pub fn should_retain(
    &self,
    record_date: DateTime<Utc>,
    category: DataCategory,
    now: DateTime<Utc>,
  ) -> bool {
    self.resolve(category).policy.retains(record_date, now)
  }

  /// Number of fallback lookups since startup.
  pub fn policy_gaps(&self) -> u64 { self.gaps.load(Ordering::Relaxed) }

  /// Categories with no explicit entry.
  pub fn missing_categories(&self) -> Vec<DataCategory> {
    DataCategory::all()
      .filter(|c| !self.policies.contains_key(c))
      .collect()
  }

  /// Explicit entries, in category order.
  pub fn policies(&self) -> Vec<RetentionPolicy> {
    let mut policies: Vec<_> = self.policies.values().cloned().collect();
    policies.sort_by_key(|p| p.category);
    policies
  }
}

impl Default for RetentionPolicyTable {
  fn default() -> Self { Self::standard() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn days_ago(days: i64) -> DateTime<Utc> { Utc::now() - Duration::days(days) }

  #[test]
  fn standard_table_covers_every_category() {
    let table = RetentionPolicyTable::standard();
    assert!(table.missing_categories().is_empty());
    assert_eq!(table.policies().len(), DataCategory::all().count());
  }

  #[test]
  fn marketing_data_past_window_is_not_retained() {
    let table = RetentionPolicyTable::standard();
    let now = Utc::now();
    assert!(!table.should_retain(days_ago(731), DataCategory::MarketingData, now));
    assert!(table.should_retain(days_ago(700), DataCategory::MarketingData, now));
  }

  #[test]
  fn session_logs_expire_after_thirty_days() {
    let table = RetentionPolicyTable::standard();
    let now = Utc::now();
    assert!(!table.should_retain(days_ago(31), DataCategory::SessionLogs, now));
    assert!(table.should_retain(days_ago(29), DataCategory::SessionLogs, now));
  }

  #[test]
  fn medical_records_are_kept_for_seven_years() {
    let table = RetentionPolicyTable::standard();
    let now = Utc::now();
    assert!(table.should_retain(days_ago(365), DataCategory::MedicalRecords, now));
    assert!(!table.should_retain(days_ago(2556), DataCategory::MedicalRecords, now));
  }

  #[test]
  fn window_boundary_is_exclusive() {
    let policy = RetentionPolicy::new(
      DataCategory::SessionLogs,
      30,
      "test",
      ErasureMode::Delete,
    );
    let now = Utc::now();
    assert!(!policy.retains(now - Duration::days(30), now));
    assert!(policy.retains(now - Duration::days(30) + Duration::seconds(1), now));
  }

  #[test]
  fn missing_category_falls_back_and_counts_gap() {
    let table = RetentionPolicyTable::new([RetentionPolicy::new(
      DataCategory::Profiles,
      0,
      "test",
      ErasureMode::Delete,
    )])
    .unwrap();

    assert_eq!(table.policy_gaps(), 0);
    let resolved = table.resolve(DataCategory::Messages);
    assert!(resolved.is_fallback);
    assert_eq!(resolved.policy.retention_days, FALLBACK_RETENTION_DAYS);
    assert_eq!(resolved.policy.legal_basis, FALLBACK_LEGAL_BASIS);

    table.policy_for(DataCategory::SessionLogs);
    assert_eq!(table.policy_gaps(), 2);

    // Explicit entries never count as gaps.
    assert!(!table.resolve(DataCategory::Profiles).is_fallback);
    assert_eq!(table.policy_gaps(), 2);
  }

  #[test]
  fn duplicate_entries_are_rejected() {
    let entry =
      RetentionPolicy::new(DataCategory::Messages, 1, "a", ErasureMode::Delete);
    let result = RetentionPolicyTable::new([entry.clone(), entry]);
    assert!(matches!(result, Err(Error::DuplicatePolicy(DataCategory::Messages))));
  }
}
