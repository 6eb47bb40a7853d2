//! Records held by the external record store, and the field-classification
//! rule used for anonymisation.
//!
//! Anonymisation is not blanket redaction: only direct identifiers are
//! replaced; clinical and measurement values survive verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{category::DataCategory, subject::SubjectId};

/// Column values of a record, keyed by field name.
pub type Fields = serde_json::Map<String, Value>;

/// Replacement value for redacted identifier fields.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// A row in the record store that references a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub record_id:   Uuid,
  pub subject_id:  SubjectId,
  pub category:    DataCategory,
  /// The record's own date, against which retention is measured.
  pub recorded_at: DateTime<Utc>,
  pub fields:      Fields,
  /// Set once the record's identifiers have been redacted in place.
  pub anonymized:  bool,
}

impl Record {
  pub fn new(
    subject_id: SubjectId,
    category: DataCategory,
    recorded_at: DateTime<Utc>,
    fields: Fields,
  ) -> Self {
    Self {
      record_id: Uuid::new_v4(),
      subject_id,
      category,
      recorded_at,
      fields,
      anonymized: false,
    }
  }
}

// ─── Field classification ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
  /// Directly identifies the subject; redacted on anonymisation.
  Identifier,
  /// Everything else, including clinical values; preserved.
  Clinical,
}

/// Normalised (lowercase, no separators) names of direct-identifier fields.
const IDENTIFIER_FIELDS: &[&str] = &[
  "name",
  "firstname",
  "lastname",
  "fullname",
  "givenname",
  "familyname",
  "nhsnumber",
  "nationalid",
  "healthidentifier",
  "email",
  "emailaddress",
  "phone",
  "phonenumber",
  "mobile",
  "address",
  "postcode",
  "dateofbirth",
];

/// Classify a field by name. Matching ignores case, `_` and `-`, so
/// `nhs_number`, `nhsNumber` and `NHS-Number` are all identifiers.
pub fn classify_field(name: &str) -> FieldClass {
  let normalised: String = name
    .chars()
    .filter(|c| *c != '_' && *c != '-')
    .flat_map(char::to_lowercase)
    .collect();
  if IDENTIFIER_FIELDS.contains(&normalised.as_str()) {
    FieldClass::Identifier
  } else {
    FieldClass::Clinical
  }
}

/// Top-level identifier field names present in `fields`.
pub fn identifier_fields(fields: &Fields) -> Vec<String> {
  fields
    .keys()
    .filter(|k| classify_field(k) == FieldClass::Identifier)
    .cloned()
    .collect()
}

/// Replace the named top-level fields with [`REDACTION_MARKER`].
pub fn redact_named(fields: &mut Fields, names: &[String]) {
  for name in names {
    if let Some(value) = fields.get_mut(name) {
      *value = Value::String(REDACTION_MARKER.to_owned());
    }
  }
}

/// Redact every identifier field, descending into nested objects and arrays.
pub fn redact_identifiers(fields: &mut Fields) {
  for (key, value) in fields.iter_mut() {
    if classify_field(key) == FieldClass::Identifier {
      *value = Value::String(REDACTION_MARKER.to_owned());
    } else {
      redact_nested(value);
    }
  }
}

fn redact_nested(value: &mut Value) {
  match value {
    Value::Object(map) => redact_identifiers(map),
    Value::Array(items) => items.iter_mut().for_each(redact_nested),
    _ => {}
  }
}
