//! Legal holds: administrative flags that suspend a subject's deletion rights.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subject::SubjectId;

/// While a hold is active (`released_at` is `None`) every deletion request for
/// the subject is refused. Holds block destruction, not access: exports still
/// proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalHold {
  pub hold_id:     Uuid,
  pub subject_id:  SubjectId,
  pub reason:      String,
  pub placed_by:   String,
  pub created_at:  DateTime<Utc>,
  pub released_at: Option<DateTime<Utc>>,
  pub released_by: Option<String>,
}

impl LegalHold {
  pub fn new(
    subject_id: SubjectId,
    reason: impl Into<String>,
    placed_by: impl Into<String>,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      hold_id: Uuid::new_v4(),
      subject_id,
      reason: reason.into(),
      placed_by: placed_by.into(),
      created_at,
      released_at: None,
      released_by: None,
    }
  }

  pub fn is_active(&self) -> bool { self.released_at.is_none() }
}
