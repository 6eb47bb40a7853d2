//! HTTP front end for the Custodia compliance engine.
//!
//! Wraps the [`custodia_api`] router with basic authentication (turning the
//! authenticated operator into the engine's [`Actor`]) and request tracing.
//!
//! [`Actor`]: custodia_core::subject::Actor

pub mod auth;
pub mod config;
pub mod error;

pub use config::ServerConfig;
pub use error::Error;

use std::sync::Arc;

use axum::{Router, middleware};
use custodia_core::store::{AuditSink, RecordStore};
use custodia_engine::ComplianceEngine;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, authenticate};

/// Build the full application: API routes behind basic auth, traced.
pub fn app<R, A>(engine: Arc<ComplianceEngine<R, A>>, auth: Arc<AuthConfig>) -> Router
where
  R: RecordStore + 'static,
  A: AuditSink + 'static,
{
  custodia_api::api_router(engine)
    .layer(middleware::from_fn_with_state(auth, authenticate))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use custodia_core::retention::RetentionPolicyTable;
  use custodia_engine::{
    ComplianceEngine,
    EngineConfig,
    memory::{MemoryAuditSink, MemoryRecordStore, RecordingNotifier},
  };
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;
  use crate::config::OperatorConfig;

  fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn make_app() -> (Router, MemoryAuditSink) {
    let store = MemoryRecordStore::new();
    store.add_subject("user_a");
    let sink = MemoryAuditSink::new();
    let engine = ComplianceEngine::new(
      store,
      sink.clone(),
      Arc::new(RecordingNotifier::new()),
      RetentionPolicyTable::standard(),
      EngineConfig::default(),
    );
    engine.init().await.unwrap();

    let auth = AuthConfig::new([
      OperatorConfig {
        username:      "frontdesk".into(),
        password_hash: hash("desk"),
        privileged:    false,
      },
      OperatorConfig {
        username:      "dpo".into(),
        password_hash: hash("secret"),
        privileged:    true,
      },
    ]);
    (app(Arc::new(engine), Arc::new(auth)), sink)
  }

  fn place_hold(auth: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
      .method("POST")
      .uri("/subjects/user_a/hold")
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder
      .body(Body::from(json!({ "reason": "audit request" }).to_string()))
      .unwrap()
  }

  #[tokio::test]
  async fn missing_credentials_are_challenged() {
    let (app, sink) = make_app().await;
    let resp = app.oneshot(place_hold(None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
    assert!(sink.is_empty());
  }

  #[tokio::test]
  async fn operator_privilege_flows_into_the_actor() {
    let (app, _) = make_app().await;
    let resp = app
      .clone()
      .oneshot(place_hold(Some(basic("frontdesk", "desk"))))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
      .oneshot(place_hold(Some(basic("dpo", "secret"))))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let hold: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(hold["placed_by"], "dpo");
  }

  #[tokio::test]
  async fn audit_events_name_the_authenticated_operator() {
    let (app, sink) = make_app().await;
    let req = Request::builder()
      .method("PUT")
      .uri("/subjects/user_a/consents/marketing")
      .header(header::AUTHORIZATION, basic("frontdesk", "desk"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json!({ "state": "granted" }).to_string()))
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(sink.events().iter().all(|e| e.actor == "frontdesk"));
  }
}
