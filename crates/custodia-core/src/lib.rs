//! Core types and trait definitions for the Custodia compliance engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! defines the vocabulary (subjects, data categories, consent, legal holds,
//! deletion requests, audit events) and the narrow traits through which the
//! engine reaches its external collaborators.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod category;
pub mod consent;
pub mod deletion;
pub mod error;
pub mod export;
pub mod hold;
pub mod record;
pub mod retention;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
