//! [`SqliteStore`]: the SQLite implementation of [`RecordStore`] and
//! [`AuditSink`].

use std::path::Path;

use chrono::Utc;
use custodia_core::{
  audit::{AuditEvent, ChainHead},
  category::DataCategory,
  record::{Record, redact_named},
  store::{AuditSink, RecordStore},
  subject::SubjectId,
};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    RawAuditEvent, RawRecord, decode_fields, encode_category, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Subject records and the audit trail backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted, so one
/// instance can serve as both the engine's record store and its audit sink.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Register a subject. Registering an existing subject is a no-op.
  pub async fn add_subject(&self, subject_id: &SubjectId) -> Result<()> {
    let id = subject_id.as_str().to_owned();
    let created_at = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO subjects (subject_id, created_at) VALUES (?1, ?2)",
          rusqlite::params![id, created_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a record, registering its subject if needed.
  pub async fn insert_record(&self, record: &Record) -> Result<()> {
    self.add_subject(&record.subject_id).await?;

    let record_id = encode_uuid(record.record_id);
    let subject_id = record.subject_id.as_str().to_owned();
    let category = encode_category(record.category);
    let recorded_at = encode_dt(record.recorded_at);
    let fields_json = serde_json::to_string(&record.fields)?;
    let anonymized = record.anonymized;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO records (
             record_id, subject_id, category, recorded_at, fields_json, anonymized
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            record_id,
            subject_id,
            category,
            recorded_at,
            fields_json,
            anonymized
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_events(
    &self,
    subject_id: Option<&SubjectId>,
  ) -> Result<Vec<AuditEvent>> {
    let subject = subject_id.map(|s| s.as_str().to_owned());

    let raws: Vec<RawAuditEvent> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(subject) = subject {
          let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audit_events WHERE subject_id = ?1 ORDER BY sequence",
            RawAuditEvent::COLUMNS
          ))?;
          stmt
            .query_map(rusqlite::params![subject], RawAuditEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audit_events ORDER BY sequence",
            RawAuditEvent::COLUMNS
          ))?;
          stmt
            .query_map([], RawAuditEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEvent::into_event).collect()
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = crate::Error;

  async fn subject_exists(&self, subject_id: &SubjectId) -> Result<bool> {
    let id = subject_id.as_str().to_owned();
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM subjects WHERE subject_id = ?1",
              rusqlite::params![id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn list_records(
    &self,
    subject_id: &SubjectId,
    category: DataCategory,
  ) -> Result<Vec<Record>> {
    let id = subject_id.as_str().to_owned();
    let category = encode_category(category);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM records
           WHERE subject_id = ?1 AND category = ?2
           ORDER BY recorded_at",
          RawRecord::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id, category], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn delete_record(&self, category: DataCategory, record_id: Uuid) -> Result<bool> {
    let id = encode_uuid(record_id);
    let category = encode_category(category);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM records WHERE record_id = ?1 AND category = ?2",
          rusqlite::params![id, category],
        )?)
      })
      .await?;
    debug!(record = %record_id, deleted, "delete_record");
    Ok(deleted > 0)
  }

  async fn anonymize_record(
    &self,
    category: DataCategory,
    record_id: Uuid,
    fields: &[String],
  ) -> Result<bool> {
    let id = encode_uuid(record_id);
    let category = encode_category(category);

    let current: Option<String> = {
      let (id, category) = (id.clone(), category.clone());
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT fields_json FROM records
                 WHERE record_id = ?1 AND category = ?2 AND anonymized = 0",
                rusqlite::params![id, category],
                |row| row.get(0),
              )
              .optional()?,
          )
        })
        .await?
    };
    let Some(current) = current else {
      return Ok(false);
    };

    let mut redacted = decode_fields(record_id, &current)?;
    redact_named(&mut redacted, fields);
    let redacted = serde_json::to_string(&redacted)?;

    // Guarded on `anonymized = 0` so a concurrent anonymisation wins once.
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE records SET fields_json = ?1, anonymized = 1
           WHERE record_id = ?2 AND category = ?3 AND anonymized = 0",
          rusqlite::params![redacted, id, category],
        )?)
      })
      .await?;
    Ok(updated > 0)
  }
}

// ─── AuditSink impl ──────────────────────────────────────────────────────────

impl AuditSink for SqliteStore {
  type Error = crate::Error;

  async fn append(&self, event: &AuditEvent) -> Result<()> {
    let sequence = event.sequence as i64;
    let event_id = encode_uuid(event.event_id);
    let subject_id = event.subject_id.as_str().to_owned();
    let action = event.action.to_string();
    let actor = event.actor.clone();
    let timestamp = encode_dt(event.timestamp);
    let details_json = serde_json::to_string(&event.details)?;
    let prev_hash = event.prev_hash.clone();
    let hash = event.hash.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_events (
             sequence, event_id, subject_id, action, actor,
             timestamp, details_json, prev_hash, hash
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            sequence,
            event_id,
            subject_id,
            action,
            actor,
            timestamp,
            details_json,
            prev_hash,
            hash,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn head(&self) -> Result<ChainHead> {
    let last: Option<(i64, String)> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT sequence, hash FROM audit_events ORDER BY sequence DESC LIMIT 1",
              [],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(last.map_or_else(ChainHead::genesis, |(sequence, hash)| ChainHead {
      sequence: sequence as u64,
      hash,
    }))
  }

  async fn all_events(&self) -> Result<Vec<AuditEvent>> { self.query_events(None).await }

  async fn events_for(&self, subject_id: &SubjectId) -> Result<Vec<AuditEvent>> {
    self.query_events(Some(subject_id)).await
  }

  async fn flush(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
