//! Runtime server configuration.
//!
//! Read from an optional TOML file layered with `CUSTODIA_`-prefixed
//! environment variables (`CUSTODIA_PORT=8080`, `CUSTODIA_STORE_PATH=...`).

use std::{path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment, File, FileFormat};
use custodia_core::retention::{RetentionPolicy, RetentionPolicyTable};
use custodia_engine::EngineConfig;
use serde::Deserialize;

use crate::auth::AuthConfig;

/// A person allowed to call the API.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  /// Privileged operators may place and release legal holds.
  #[serde(default)]
  pub privileged:    bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  pub store_path:           PathBuf,
  #[serde(default = "default_store_timeout_ms")]
  pub store_timeout_ms:     u64,
  /// How long finished deletion requests stay pollable.
  #[serde(default = "default_request_retention_ms")]
  pub request_retention_ms: u64,
  #[serde(default = "default_policy_version")]
  pub policy_version:       String,
  #[serde(default)]
  pub operators:            Vec<OperatorConfig>,
  /// Replaces the built-in retention table when present.
  #[serde(default)]
  pub retention:            Option<Vec<RetentionPolicy>>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8750 }

fn default_store_timeout_ms() -> u64 { 30_000 }

fn default_request_retention_ms() -> u64 { 24 * 60 * 60 * 1000 }

fn default_policy_version() -> String { "1".to_owned() }

impl ServerConfig {
  /// Load from `path` (if it exists) and the environment.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from(path.into()).required(false))
      .add_source(Environment::with_prefix("CUSTODIA"))
      .build()?
      .try_deserialize()
  }

  /// Parse a TOML document, ignoring the environment.
  pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()?
      .try_deserialize()
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      policy_version:    self.policy_version.clone(),
      store_timeout:     Duration::from_millis(self.store_timeout_ms),
      request_retention: Duration::from_millis(self.request_retention_ms),
    }
  }

  /// The configured retention table, or the built-in one.
  pub fn retention_table(&self) -> custodia_core::Result<RetentionPolicyTable> {
    match &self.retention {
      Some(policies) => RetentionPolicyTable::new(policies.iter().cloned()),
      None => Ok(RetentionPolicyTable::standard()),
    }
  }

  pub fn auth_config(&self) -> AuthConfig { AuthConfig::new(self.operators.iter().cloned()) }
}
