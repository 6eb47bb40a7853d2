//! `GET /policies`: the active retention table and the policy-gap counter.

use axum::{Json, extract::State};
use custodia_core::{
  retention::RetentionPolicy,
  store::{AuditSink, RecordStore},
};
use serde::Serialize;

use crate::Engine;

#[derive(Debug, Serialize)]
pub struct PolicyView {
  pub policies:    Vec<RetentionPolicy>,
  pub policy_gaps: u64,
}

/// `GET /policies`
pub async fn list<R, A>(State(engine): State<Engine<R, A>>) -> Json<PolicyView>
where
  R: RecordStore,
  A: AuditSink,
{
  Json(PolicyView {
    policies:    engine.policies(),
    policy_gaps: engine.policy_gaps(),
  })
}
