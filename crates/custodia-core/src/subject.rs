//! Subject identity and the principal acting on a subject's data.
//!
//! The engine never owns subjects; it only references them by an opaque,
//! stable identifier handed out by the record store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a data subject (a patient or user).
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SubjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for SubjectId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for SubjectId {
  fn from(s: String) -> Self { Self(s) }
}

/// Whoever triggered a compliance-relevant action.
///
/// The engine trusts the identity it is handed; authentication and
/// authorisation belong to the caller. The name is recorded verbatim in every
/// audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub name:       String,
  /// Privileged actors may place and release legal holds.
  pub privileged: bool,
}

impl Actor {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), privileged: false }
  }

  pub fn privileged(name: impl Into<String>) -> Self {
    Self { name: name.into(), privileged: true }
  }

  /// The engine itself, e.g. when replaying or running scheduled work.
  pub fn system() -> Self { Self::privileged("system") }
}
