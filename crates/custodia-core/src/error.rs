//! Error types for `custodia-core`.

use thiserror::Error;

use crate::{category::DataCategory, consent::ConsentState};

#[derive(Debug, Error)]
pub enum Error {
  #[error("consent cannot move from {from} to {to}")]
  InvalidTransition { from: ConsentState, to: ConsentState },

  #[error("retention policy for {0} is defined more than once")]
  DuplicatePolicy(DataCategory),

  #[error("unknown data category: {0:?}")]
  UnknownCategory(String),

  #[error("unknown audit action: {0:?}")]
  UnknownAction(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
