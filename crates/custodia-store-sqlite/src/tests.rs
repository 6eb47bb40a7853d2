//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::{Duration, Utc};
use custodia_core::{
  audit::{AuditAction, AuditEvent, ChainHead, NewAuditEvent, verify_chain},
  category::DataCategory,
  consent::{ConsentPurpose, ConsentState},
  deletion::DeletionStatus,
  record::{Fields, REDACTION_MARKER, Record},
  retention::RetentionPolicyTable,
  store::{AuditSink, RecordStore},
  subject::{Actor, SubjectId},
};
use custodia_engine::{
  ComplianceEngine, DeletionParams, EngineConfig, memory::RecordingNotifier,
};
use serde_json::json;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn record(
  subject: &str,
  category: DataCategory,
  age_days: i64,
  fields: serde_json::Value,
) -> Record {
  let fields: Fields = fields.as_object().cloned().unwrap_or_default();
  Record::new(
    SubjectId::new(subject),
    category,
    Utc::now() - Duration::days(age_days),
    fields,
  )
}

fn chain(subject: &str, n: usize) -> Vec<AuditEvent> {
  let mut head = ChainHead::genesis();
  let mut events = Vec::new();
  for i in 0..n {
    let event = AuditEvent::seal(
      NewAuditEvent::new(subject.into(), AuditAction::ConsentGranted, "tester")
        .with("purpose", "marketing")
        .with("i", i),
      &head,
      Utc::now(),
    );
    head = event.head();
    events.push(event);
  }
  events
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn subjects_are_registered_once() {
  let s = store().await;
  let subject = SubjectId::new("user_a");
  assert!(!s.subject_exists(&subject).await.unwrap());

  s.add_subject(&subject).await.unwrap();
  s.add_subject(&subject).await.unwrap();
  assert!(s.subject_exists(&subject).await.unwrap());
}

#[tokio::test]
async fn list_records_filters_by_subject_and_category() {
  let s = store().await;
  let mine = record("user_a", DataCategory::Messages, 3, json!({ "body": "hi" }));
  s.insert_record(&mine).await.unwrap();
  s.insert_record(&record("user_a", DataCategory::Appointments, 3, json!({})))
    .await
    .unwrap();
  s.insert_record(&record("user_b", DataCategory::Messages, 3, json!({})))
    .await
    .unwrap();

  let listed = s
    .list_records(&SubjectId::new("user_a"), DataCategory::Messages)
    .await
    .unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].record_id, mine.record_id);
  assert_eq!(listed[0].fields["body"], "hi");
  assert_eq!(listed[0].recorded_at, mine.recorded_at);
  assert!(!listed[0].anonymized);
}

#[tokio::test]
async fn delete_record_is_idempotent() {
  let s = store().await;
  let r = record("user_a", DataCategory::Messages, 3, json!({}));
  s.insert_record(&r).await.unwrap();

  assert!(s.delete_record(DataCategory::Messages, r.record_id).await.unwrap());
  assert!(!s.delete_record(DataCategory::Messages, r.record_id).await.unwrap());
}

#[tokio::test]
async fn delete_record_respects_category() {
  let s = store().await;
  let r = record("user_a", DataCategory::Messages, 3, json!({}));
  s.insert_record(&r).await.unwrap();

  assert!(!s.delete_record(DataCategory::Profiles, r.record_id).await.unwrap());
  let left = s
    .list_records(&SubjectId::new("user_a"), DataCategory::Messages)
    .await
    .unwrap();
  assert_eq!(left.len(), 1);
}

#[tokio::test]
async fn anonymize_record_redacts_named_fields_once() {
  let s = store().await;
  let r = record(
    "user_a",
    DataCategory::TestResults,
    3000,
    json!({ "name": "Ada", "email": "ada@example.com", "cholesterol": 220 }),
  );
  s.insert_record(&r).await.unwrap();

  let fields = vec!["name".to_owned(), "email".to_owned()];
  assert!(
    s.anonymize_record(DataCategory::TestResults, r.record_id, &fields)
      .await
      .unwrap()
  );
  assert!(
    !s.anonymize_record(DataCategory::TestResults, r.record_id, &fields)
      .await
      .unwrap()
  );

  let stored = s
    .list_records(&r.subject_id, DataCategory::TestResults)
    .await
    .unwrap()
    .remove(0);
  assert!(stored.anonymized);
  assert_eq!(stored.fields["name"], REDACTION_MARKER);
  assert_eq!(stored.fields["email"], REDACTION_MARKER);
  assert_eq!(stored.fields["cholesterol"], 220);
}

// ─── Audit sink ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_sink_head_is_genesis() {
  let s = store().await;
  assert_eq!(s.head().await.unwrap(), ChainHead::genesis());
  assert!(s.all_events().await.unwrap().is_empty());
}

#[tokio::test]
async fn appended_events_round_trip_with_valid_hashes() {
  let s = store().await;
  let events = chain("user_a", 4);
  for event in &events {
    s.append(event).await.unwrap();
  }

  let stored = s.all_events().await.unwrap();
  assert_eq!(stored, events);
  let head = verify_chain(&stored).unwrap();
  assert_eq!(head, events[3].head());
  assert_eq!(s.head().await.unwrap(), head);
}

#[tokio::test]
async fn events_for_filters_by_subject() {
  let s = store().await;
  let mut head = ChainHead::genesis();
  for subject in ["user_a", "user_b", "user_a"] {
    let event = AuditEvent::seal(
      NewAuditEvent::new(subject.into(), AuditAction::LegalHoldPlaced, "dpo"),
      &head,
      Utc::now(),
    );
    head = event.head();
    s.append(&event).await.unwrap();
  }

  let a = s.events_for(&SubjectId::new("user_a")).await.unwrap();
  assert_eq!(a.len(), 2);
  assert_eq!(a[0].sequence, 1);
  assert_eq!(a[1].sequence, 3);
}

#[tokio::test]
async fn duplicate_sequence_is_rejected() {
  let s = store().await;
  let events = chain("user_a", 1);
  s.append(&events[0]).await.unwrap();
  assert!(s.append(&events[0]).await.is_err());
}

#[tokio::test]
async fn audit_rows_cannot_be_updated_or_deleted() {
  let s = store().await;
  for event in &chain("user_a", 2) {
    s.append(event).await.unwrap();
  }

  let update = s
    .conn
    .call(|conn| Ok(conn.execute("UPDATE audit_events SET actor = 'mallory'", [])))
    .await
    .unwrap();
  assert!(update.is_err());

  let delete = s
    .conn
    .call(|conn| Ok(conn.execute("DELETE FROM audit_events", [])))
    .await
    .unwrap();
  assert!(delete.is_err());

  assert_eq!(s.all_events().await.unwrap().len(), 2);
}

#[tokio::test]
async fn flush_succeeds() {
  let s = store().await;
  s.append(&chain("user_a", 1)[0]).await.unwrap();
  s.flush().await.unwrap();
}

// ─── Engine over SQLite ──────────────────────────────────────────────────────

#[tokio::test]
async fn engine_runs_a_full_erasure_against_sqlite() {
  let s = store().await;
  let subject = SubjectId::new("user_a");
  s.insert_record(&record("user_a", DataCategory::Profiles, 1, json!({ "name": "Ada" })))
    .await
    .unwrap();
  s.insert_record(&record(
    "user_a",
    DataCategory::MedicalRecords,
    8 * 365,
    json!({ "full_name": "Ada", "diagnosis": "J45" }),
  ))
  .await
  .unwrap();
  s.insert_record(&record("user_a", DataCategory::AuditLogs, 5, json!({ "login": true })))
    .await
    .unwrap();

  let engine = ComplianceEngine::new(
    s.clone(),
    s.clone(),
    Arc::new(RecordingNotifier::new()),
    RetentionPolicyTable::standard(),
    EngineConfig::default(),
  );
  engine.init().await.unwrap();
  let actor = Actor::new("patient-portal");
  engine
    .set_consent(&subject, &ConsentPurpose::Marketing, ConsentState::Granted, &actor)
    .await
    .unwrap();

  let request = engine
    .request_deletion(DeletionParams::new(subject.clone(), actor))
    .await
    .unwrap();
  assert_eq!(request.status, DeletionStatus::Completed);

  assert!(s.list_records(&subject, DataCategory::Profiles).await.unwrap().is_empty());
  let medical = s.list_records(&subject, DataCategory::MedicalRecords).await.unwrap();
  assert!(medical[0].anonymized);
  assert_eq!(medical[0].fields["diagnosis"], "J45");
  assert_eq!(s.list_records(&subject, DataCategory::AuditLogs).await.unwrap().len(), 1);

  let report = engine.verify_audit_trail().await.unwrap();
  assert_eq!(report.events, 4);
  engine.shutdown().await.unwrap();

  // A second engine over the same database picks up where the first left off.
  let restarted = ComplianceEngine::new(
    s.clone(),
    s.clone(),
    Arc::new(RecordingNotifier::new()),
    RetentionPolicyTable::standard(),
    EngineConfig::default(),
  );
  restarted.init().await.unwrap();
  assert_eq!(
    restarted
      .consent_state(&subject, &ConsentPurpose::Marketing)
      .await,
    ConsentState::Granted
  );
}
