// caisse/src/services/session.rs

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
  pub id: String,
  pub email: Option<String>,
  pub role: Option<String>,
}

impl SessionUser {
  pub fn is_admin(&self) -> bool {
    self.role.as_deref() == Some("admin")
  }
}

/// Resolves a bearer session token to the user behind it.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
  async fn verify(&self, token: &str) -> Result<SessionUser>;
}

#[derive(Deserialize)]
struct AuthUserResponse {
  id: String,
  email: Option<String>,
  #[serde(default)]
  app_metadata: JsonValue,
}

/// Asks the hosted auth backend who owns the token (`GET {base}/auth/v1/user`).
pub struct HttpSessionVerifier {
  client: reqwest::Client,
  base_url: Option<String>,
  api_key: Option<String>,
}

impl HttpSessionVerifier {
  pub fn new(client: reqwest::Client, base_url: Option<String>, api_key: Option<String>) -> Self {
    Self {
      client,
      base_url,
      api_key,
    }
  }
}

#[async_trait]
impl SessionVerifier for HttpSessionVerifier {
  #[instrument(name = "session::verify", skip_all)]
  async fn verify(&self, token: &str) -> Result<SessionUser> {
    let Some(base_url) = &self.base_url else {
      warn!("Bearer token presented but no auth backend is configured.");
      return Err(AppError::Unauthorized("Session verification unavailable".to_string()));
    };

    let mut request = self
      .client
      .get(format!("{}/auth/v1/user", base_url))
      .bearer_auth(token);
    if let Some(key) = &self.api_key {
      request = request.header("apikey", key);
    }
    let response = request.send().await?;

    match response.status() {
      StatusCode::OK => {}
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
        return Err(AppError::Unauthorized("Invalid session".to_string()));
      }
      other => return Err(AppError::Upstream(format!("auth backend answered {}", other))),
    }

    let user: AuthUserResponse = response.json().await?;
    Ok(SessionUser {
      role: user
        .app_metadata
        .get("role")
        .and_then(JsonValue::as_str)
        .map(str::to_string),
      id: user.id,
      email: user.email,
    })
  }
}
