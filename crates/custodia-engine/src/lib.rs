//! The Custodia compliance engine.
//!
//! Orchestrates consent tracking, legal holds, cascading erasure, exports and
//! the audit trail over injected collaborators (a [`RecordStore`] and an
//! [`AuditSink`]). Nothing here is global: everything hangs off an explicitly
//! constructed [`ComplianceEngine`].
//!
//! [`RecordStore`]: custodia_core::store::RecordStore
//! [`AuditSink`]: custodia_core::store::AuditSink

pub mod audit_log;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod export;
pub mod holds;
pub mod ledger;
pub mod memory;
pub mod orchestrator;

mod sync;

pub use config::EngineConfig;
pub use audit_log::IntegrityReport;
pub use engine::{ComplianceEngine, ConsentChange};
pub use error::{Error, Result};
pub use dispatcher::LogNotifier;
pub use orchestrator::DeletionParams;
