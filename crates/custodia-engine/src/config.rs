//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

/// Tunables handed to [`ComplianceEngine::new`](crate::ComplianceEngine::new).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Privacy-policy version stamped on consent records.
  pub policy_version:    String,
  /// Default bound on each record store call when the caller supplies none.
  #[serde(with = "millis", rename = "store_timeout_ms")]
  pub store_timeout:     Duration,
  /// How long finished deletion requests stay available for polling.
  #[serde(with = "millis", rename = "request_retention_ms")]
  pub request_retention: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      policy_version:    "1".to_owned(),
      store_timeout:     Duration::from_secs(30),
      request_retention: Duration::from_secs(24 * 60 * 60),
    }
  }
}

mod millis {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer};

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
  }
}
