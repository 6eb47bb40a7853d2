//! Router tests driven through `tower::ServiceExt::oneshot` against the
//! in-memory engine collaborators.

use std::sync::Arc;

use axum::{
  Extension,
  Router,
  body::Body,
  http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use custodia_core::{
  category::DataCategory,
  record::{Fields, REDACTION_MARKER, Record},
  retention::RetentionPolicyTable,
  subject::{Actor, SubjectId},
};
use custodia_engine::{
  ComplianceEngine,
  EngineConfig,
  memory::{MemoryAuditSink, MemoryRecordStore, RecordingNotifier},
};
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{Engine, api_router};

struct TestApp {
  engine: Engine<MemoryRecordStore, MemoryAuditSink>,
  store:  MemoryRecordStore,
  sink:   MemoryAuditSink,
}

async fn app() -> TestApp {
  let store = MemoryRecordStore::new();
  let sink = MemoryAuditSink::new();
  let engine = ComplianceEngine::new(
    store.clone(),
    sink.clone(),
    Arc::new(RecordingNotifier::new()),
    RetentionPolicyTable::standard(),
    EngineConfig::default(),
  );
  engine.init().await.unwrap();
  TestApp { engine: Arc::new(engine), store, sink }
}

impl TestApp {
  fn router(&self, actor: Actor) -> Router {
    api_router(self.engine.clone()).layer(Extension(actor))
  }

  fn seed(&self, subject: &str, category: DataCategory, age_days: i64, fields: Value) {
    let fields: Fields = fields.as_object().cloned().unwrap_or_default();
    self.store.insert(Record::new(
      SubjectId::new(subject),
      category,
      Utc::now() - Duration::days(age_days),
      fields,
    ));
  }

  async fn send(
    &self,
    actor: Actor,
    method: Method,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = self.router(actor).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let json = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
  }
}

fn dpo() -> Actor { Actor::privileged("dpo@clinic.example") }

fn portal() -> Actor { Actor::new("patient-portal") }

// ─── Deletions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deletion_completes_and_can_be_polled() {
  let app = app().await;
  app.seed("user_a", DataCategory::Profiles, 1, json!({ "name": "Ada" }));
  app.seed("user_a", DataCategory::Messages, 400, json!({ "body": "hello" }));
  app.seed("user_a", DataCategory::AuditLogs, 3, json!({ "login": true }));

  let (status, body) = app
    .send(portal(), Method::POST, "/subjects/user_a/deletions", Some(json!({})))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "completed");
  assert_eq!(body["deletion_allowed"], true);
  assert_eq!(body["summary"]["categories"]["profiles"]["deleted"], 1);
  assert_eq!(body["summary"]["categories"]["messages"]["deleted"], 1);
  assert_eq!(body["summary"]["audit_logs_excluded"], true);

  let id = body["request_id"].as_str().unwrap().to_owned();
  let (status, polled) = app
    .send(portal(), Method::GET, &format!("/deletions/{id}"), None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(polled, body);
}

#[tokio::test]
async fn deletion_honours_requested_categories() {
  let app = app().await;
  app.seed("user_a", DataCategory::Profiles, 1, json!({ "name": "Ada" }));
  app.seed("user_a", DataCategory::Messages, 400, json!({ "body": "hello" }));

  let (status, body) = app
    .send(
      portal(),
      Method::POST,
      "/subjects/user_a/deletions",
      Some(json!({ "categories": ["messages"], "timeout_ms": 5000 })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["categories_requested"], json!(["messages"]));
  assert!(body["summary"]["categories"].get("profiles").is_none());
  assert_eq!(
    app
      .store
      .records(&SubjectId::new("user_a"), DataCategory::Profiles)
      .len(),
    1
  );
}

#[tokio::test]
async fn empty_category_list_is_rejected() {
  let app = app().await;
  app.seed("user_a", DataCategory::Profiles, 1, json!({}));
  let (status, body) = app
    .send(
      portal(),
      Method::POST,
      "/subjects/user_a/deletions",
      Some(json!({ "categories": [] })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("categories"));
}

#[tokio::test]
async fn unknown_subject_is_404() {
  let app = app().await;
  let (status, body) = app
    .send(portal(), Method::POST, "/subjects/ghost/deletions", Some(json!({})))
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_request_is_404() {
  let app = app().await;
  let uri = format!("/deletions/{}", uuid::Uuid::new_v4());
  let (status, _) = app.send(portal(), Method::GET, &uri, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Holds ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn hold_blocks_deletion_until_released() {
  let app = app().await;
  app.seed("user_legal_hold", DataCategory::Profiles, 1, json!({ "name": "Ada" }));

  let (status, hold) = app
    .send(
      dpo(),
      Method::POST,
      "/subjects/user_legal_hold/hold",
      Some(json!({ "reason": "litigation 2024-117" })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(hold["reason"], "litigation 2024-117");

  let (status, again) = app
    .send(
      dpo(),
      Method::POST,
      "/subjects/user_legal_hold/hold",
      Some(json!({ "reason": "second" })),
    )
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(again["error"].is_string());

  let (status, blocked) = app
    .send(portal(), Method::POST, "/subjects/user_legal_hold/deletions", Some(json!({})))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(blocked["status"], "blocked");
  assert_eq!(blocked["deletion_allowed"], false);
  assert_eq!(blocked["hold_reason"], "litigation 2024-117");
  assert_eq!(app.store.mutation_calls(), 0);

  let (status, released) = app
    .send(dpo(), Method::DELETE, "/subjects/user_legal_hold/hold", None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(released["released_by"], "dpo@clinic.example");

  let (status, _) = app
    .send(portal(), Method::GET, "/subjects/user_legal_hold/hold", None)
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (_, done) = app
    .send(portal(), Method::POST, "/subjects/user_legal_hold/deletions", Some(json!({})))
    .await;
  assert_eq!(done["status"], "completed");
}

#[tokio::test]
async fn unprivileged_actor_cannot_manage_holds() {
  let app = app().await;
  let (status, _) = app
    .send(
      portal(),
      Method::POST,
      "/subjects/user_a/hold",
      Some(json!({ "reason": "nope" })),
    )
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = app
    .send(portal(), Method::DELETE, "/subjects/user_a/hold", None)
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(app.sink.is_empty());
}

#[tokio::test]
async fn releasing_without_a_hold_is_404() {
  let app = app().await;
  let (status, _) = app
    .send(dpo(), Method::DELETE, "/subjects/user_a/hold", None)
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Consents ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn withdrawing_ai_processing_reports_triggered_actions() {
  let app = app().await;
  let (status, body) = app
    .send(
      portal(),
      Method::PUT,
      "/subjects/user_a/consents/ai_processing",
      Some(json!({ "state": "granted" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["record"]["state"], "granted");

  let (status, body) = app
    .send(
      portal(),
      Method::PUT,
      "/subjects/user_a/consents/ai_processing",
      Some(json!({ "state": "withdrawn" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["record"]["state"], "withdrawn");
  assert_eq!(
    body["triggered_actions"],
    json!(["STOP_AI_ANALYSIS", "RETAIN_EXISTING_SUMMARIES"])
  );

  let (status, list) = app
    .send(portal(), Method::GET, "/subjects/user_a/consents", None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(list.as_array().unwrap().len(), 1);
  assert_eq!(list[0]["purpose"], "ai_processing");
  assert_eq!(list[0]["state"], "withdrawn");
}

#[tokio::test]
async fn setting_consent_to_unset_is_unprocessable() {
  let app = app().await;
  let (status, body) = app
    .send(
      portal(),
      Method::PUT,
      "/subjects/user_a/consents/marketing",
      Some(json!({ "state": "unset" })),
    )
    .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["error"].is_string());
}

// ─── Exports ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymised_export_redacts_identifiers() {
  let app = app().await;
  app.seed(
    "user_a",
    DataCategory::TestResults,
    30,
    json!({
      "name": "Ada Lovelace",
      "nhs_number": "943 476 5919",
      "email": "ada@example.com",
      "cholesterol": 220
    }),
  );

  let (status, body) = app
    .send(portal(), Method::GET, "/subjects/user_a/export?anonymize=true", None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["metadata"]["anonymized"], true);
  assert!(body["subject_id"].is_null());

  let fields = &body["sections"]["test_results"][0]["fields"];
  assert_eq!(fields["name"], REDACTION_MARKER);
  assert_eq!(fields["nhs_number"], REDACTION_MARKER);
  assert_eq!(fields["email"], REDACTION_MARKER);
  assert_eq!(fields["cholesterol"], 220);
}

#[tokio::test]
async fn plain_export_keeps_identity() {
  let app = app().await;
  app.seed("user_a", DataCategory::Profiles, 1, json!({ "name": "Ada" }));

  let (status, body) = app
    .send(portal(), Method::GET, "/subjects/user_a/export", None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["subject_id"], "user_a");
  assert_eq!(body["profile"]["name"], "Ada");
  assert_eq!(body["metadata"]["record_count"], 1);
}

// ─── Audit & policies ─────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_trail_lists_subject_events_and_chain_verifies() {
  let app = app().await;
  app.seed("user_a", DataCategory::Profiles, 1, json!({ "name": "Ada" }));
  app
    .send(portal(), Method::POST, "/subjects/user_a/deletions", Some(json!({})))
    .await;

  let (status, trail) = app
    .send(dpo(), Method::GET, "/subjects/user_a/audit", None)
    .await;
  assert_eq!(status, StatusCode::OK);
  let actions: Vec<&str> = trail
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["action"].as_str().unwrap())
    .collect();
  assert_eq!(actions, ["DELETION_STARTED", "DELETION_PROCESSED"]);

  let (status, report) = app.send(dpo(), Method::GET, "/audit/verify", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["events"], 2);
  assert_eq!(report["head_hash"], trail[1]["hash"]);
}

#[tokio::test]
async fn tampered_chain_fails_verification() {
  let app = app().await;
  app
    .send(
      portal(),
      Method::PUT,
      "/subjects/user_a/consents/marketing",
      Some(json!({ "state": "granted" })),
    )
    .await;
  app.sink.tamper(1, |event| event.actor = "mallory".into());

  let (status, body) = app.send(dpo(), Method::GET, "/audit/verify", None).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn policies_lists_the_table() {
  let app = app().await;
  let (status, body) = app.send(dpo(), Method::GET, "/policies", None).await;
  assert_eq!(status, StatusCode::OK);
  let policies = body["policies"].as_array().unwrap();
  assert!(
    policies
      .iter()
      .any(|p| p["category"] == "medical_records" && p["erasure_mode"] == "anonymize")
  );
  assert_eq!(body["policy_gaps"], 0);
}
