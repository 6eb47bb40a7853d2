//! JSON REST API for Custodia.
//!
//! Exposes an axum [`Router`] over a [`ComplianceEngine`]. Authentication,
//! TLS, and transport concerns are the caller's responsibility: every request
//! must carry an [`Actor`] request extension naming who is acting.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", custodia_api::api_router(engine.clone()))
//!   .layer(Extension(actor))
//! ```
//!
//! [`Actor`]: custodia_core::subject::Actor

pub mod audit;
pub mod consents;
pub mod deletions;
pub mod error;
pub mod exports;
pub mod holds;
pub mod policies;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use custodia_core::store::{AuditSink, RecordStore};
use custodia_engine::ComplianceEngine;

pub use error::ApiError;

/// Shared handler state.
pub type Engine<R, A> = Arc<ComplianceEngine<R, A>>;

/// Build the API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<R, A>(engine: Engine<R, A>) -> Router<()>
where
  R: RecordStore + 'static,
  A: AuditSink + 'static,
{
  Router::new()
    // Erasure
    .route("/subjects/{id}/deletions", post(deletions::create::<R, A>))
    .route("/deletions/{request_id}", get(deletions::get_one::<R, A>))
    // Access
    .route("/subjects/{id}/export", get(exports::export::<R, A>))
    // Consent
    .route("/subjects/{id}/consents", get(consents::list::<R, A>))
    .route("/subjects/{id}/consents/{purpose}", put(consents::set::<R, A>))
    // Legal holds
    .route(
      "/subjects/{id}/hold",
      get(holds::get_one::<R, A>)
        .post(holds::place::<R, A>)
        .delete(holds::release::<R, A>),
    )
    // Audit
    .route("/subjects/{id}/audit", get(audit::trail::<R, A>))
    .route("/audit/verify", get(audit::verify::<R, A>))
    // Policies
    .route("/policies", get(policies::list::<R, A>))
    .with_state(engine)
}

#[cfg(test)]
mod tests;
