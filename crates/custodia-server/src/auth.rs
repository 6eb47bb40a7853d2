//! HTTP Basic authentication of operators.
//!
//! Each configured operator becomes an [`Actor`] once their credentials check
//! out; the middleware inserts it as a request extension for the API handlers.

use std::{collections::HashMap, sync::Arc};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use custodia_core::subject::Actor;
use tracing::debug;

use crate::{config::OperatorConfig, error::Error};

/// Operators accepted by this server instance, keyed by username.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  operators: HashMap<String, OperatorConfig>,
}

impl AuthConfig {
  pub fn new(operators: impl IntoIterator<Item = OperatorConfig>) -> Self {
    Self {
      operators: operators
        .into_iter()
        .map(|op| (op.username.clone(), op))
        .collect(),
    }
  }

  pub fn is_empty(&self) -> bool { self.operators.is_empty() }
}

/// Verify credentials from headers and return the operator as an [`Actor`].
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Actor, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let operator = config.operators.get(username).ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&operator.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(Actor {
    name:       operator.username.clone(),
    privileged: operator.privileged,
  })
}

/// Middleware: reject unauthenticated requests, otherwise attach the
/// [`Actor`] extension.
pub async fn authenticate(
  State(config): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let actor = verify_auth(req.headers(), &config).inspect_err(|_| {
    debug!(uri = %req.uri(), "rejected credentials");
  })?;
  req.extensions_mut().insert(actor);
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::{HeaderValue, header};
  use rand_core::OsRng;

  fn make_config(password: &str, privileged: bool) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AuthConfig::new([OperatorConfig {
      username:      "dpo".to_string(),
      password_hash: hash,
      privileged,
    }])
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[test]
  fn correct_credentials_yield_actor() {
    let config = make_config("secret", true);
    let actor = verify_auth(&headers(&basic("dpo", "secret")), &config).unwrap();
    assert_eq!(actor, Actor::privileged("dpo"));
  }

  #[test]
  fn unprivileged_operator() {
    let config = make_config("secret", false);
    let actor = verify_auth(&headers(&basic("dpo", "secret")), &config).unwrap();
    assert!(!actor.privileged);
  }

  #[test]
  fn wrong_password() {
    let config = make_config("secret", true);
    let result = verify_auth(&headers(&basic("dpo", "wrong")), &config);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn unknown_user() {
    let config = make_config("secret", true);
    let result = verify_auth(&headers(&basic("mallory", "secret")), &config);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let config = make_config("secret", true);
    let result = verify_auth(&HeaderMap::new(), &config);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let config = make_config("secret", true);
    let result = verify_auth(&headers("Basic !!!not-base64!!!"), &config);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn malformed_stored_hash_rejects() {
    let config = AuthConfig::new([OperatorConfig {
      username:      "dpo".to_string(),
      password_hash: "not-a-phc-string".to_string(),
      privileged:    true,
    }]);
    let result = verify_auth(&headers(&basic("dpo", "secret")), &config);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }
}
