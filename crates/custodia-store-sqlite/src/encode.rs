//! Conversions between domain types and the plain-text SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase, categories
//! and actions their wire names, and structured payloads compact JSON.

use chrono::{DateTime, Utc};
use custodia_core::{
  audit::{AuditAction, AuditDetails, AuditEvent},
  category::DataCategory,
  record::{Fields, Record},
  subject::SubjectId,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_category(category: DataCategory) -> String { category.to_string() }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `records` row.
pub struct RawRecord {
  pub record_id:   String,
  pub subject_id:  String,
  pub category:    String,
  pub recorded_at: String,
  pub fields_json: String,
  pub anonymized:  bool,
}

impl RawRecord {
  pub const COLUMNS: &'static str =
    "record_id, subject_id, category, recorded_at, fields_json, anonymized";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:   row.get(0)?,
      subject_id:  row.get(1)?,
      category:    row.get(2)?,
      recorded_at: row.get(3)?,
      fields_json: row.get(4)?,
      anonymized:  row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<Record> {
    let record_id = decode_uuid(&self.record_id)?;
    Ok(Record {
      record_id,
      subject_id: SubjectId::new(self.subject_id),
      category: DataCategory::parse(&self.category)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      fields: decode_fields(record_id, &self.fields_json)?,
      anonymized: self.anonymized,
    })
  }
}

pub fn decode_fields(record_id: Uuid, json: &str) -> Result<Fields> {
  match serde_json::from_str(json)? {
    serde_json::Value::Object(fields) => Ok(fields),
    _ => Err(Error::MalformedFields(record_id)),
  }
}

/// Raw values read directly from an `audit_events` row.
pub struct RawAuditEvent {
  pub sequence:     i64,
  pub event_id:     String,
  pub subject_id:   String,
  pub action:       String,
  pub actor:        String,
  pub timestamp:    String,
  pub details_json: String,
  pub prev_hash:    String,
  pub hash:         String,
}

impl RawAuditEvent {
  pub const COLUMNS: &'static str = "sequence, event_id, subject_id, action, actor, \
                                     timestamp, details_json, prev_hash, hash";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sequence:     row.get(0)?,
      event_id:     row.get(1)?,
      subject_id:   row.get(2)?,
      action:       row.get(3)?,
      actor:        row.get(4)?,
      timestamp:    row.get(5)?,
      details_json: row.get(6)?,
      prev_hash:    row.get(7)?,
      hash:         row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<AuditEvent> {
    let details: AuditDetails = serde_json::from_str(&self.details_json)?;
    Ok(AuditEvent {
      event_id: decode_uuid(&self.event_id)?,
      sequence: self.sequence as u64,
      subject_id: SubjectId::new(self.subject_id),
      action: AuditAction::parse(&self.action)?,
      actor: self.actor,
      timestamp: decode_dt(&self.timestamp)?,
      details,
      prev_hash: self.prev_hash,
      hash: self.hash,
    })
  }
}
