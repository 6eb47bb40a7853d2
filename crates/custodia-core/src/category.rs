//! The classes of records held about a subject.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator as _};

/// A class of records. The set is static and fixed at compile time; the string
/// form (`snake_case`) is what the record store and the wire use.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataCategory {
  Profiles,
  MedicalRecords,
  TestResults,
  AiSummaries,
  Messages,
  Appointments,
  MarketingData,
  SessionLogs,
  /// The application's own audit rows about the subject. Never erased.
  AuditLogs,
}

impl DataCategory {
  /// Every category, in declaration order.
  pub fn all() -> impl Iterator<Item = Self> { Self::iter() }

  pub fn is_audit(self) -> bool { matches!(self, Self::AuditLogs) }

  /// Parse the stored string form.
  pub fn parse(s: &str) -> crate::Result<Self> {
    s.parse()
      .map_err(|_| crate::Error::UnknownCategory(s.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn string_forms_match_serde() {
    for category in DataCategory::all() {
      let json = serde_json::to_value(category).unwrap();
      assert_eq!(json.as_str(), Some(category.as_ref()));
      assert_eq!(DataCategory::parse(category.as_ref()).unwrap(), category);
    }
  }

  #[test]
  fn unknown_category_is_rejected() {
    assert!(matches!(
      DataCategory::parse("bookings"),
      Err(crate::Error::UnknownCategory(s)) if s == "bookings"
    ));
  }
}
