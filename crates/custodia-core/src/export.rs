//! Export bundles: a subject's data as a structured snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  category::DataCategory,
  consent::ConsentRecord,
  record::{Fields, Record},
  subject::SubjectId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
  #[default]
  Json,
}

/// How long a category's remaining data will be kept, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPeriod {
  pub retention_days: u32,
  pub legal_basis:    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
  pub exported_at:       DateTime<Utc>,
  pub format:            ExportFormat,
  pub data_categories:   Vec<DataCategory>,
  pub retention_periods: BTreeMap<DataCategory, RetentionPeriod>,
  pub anonymized:        bool,
  pub record_count:      usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedRecord {
  pub record_id:   Uuid,
  pub recorded_at: DateTime<Utc>,
  pub fields:      Fields,
  pub anonymized:  bool,
}

impl From<Record> for ExportedRecord {
  fn from(r: Record) -> Self {
    Self {
      record_id:   r.record_id,
      recorded_at: r.recorded_at,
      fields:      r.fields,
      anonymized:  r.anonymized,
    }
  }
}

/// One section per data category present for the subject. The profile is
/// lifted out of its section for convenience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
  /// `None` in an anonymised export.
  pub subject_id: Option<SubjectId>,
  pub profile:    Option<Fields>,
  pub sections:   BTreeMap<DataCategory, Vec<ExportedRecord>>,
  pub consents:   Vec<ConsentRecord>,
  pub metadata:   ExportMetadata,
}
