// caisse/src/web/auth.rs

//! Request guards for internal and admin endpoints.

use crate::errors::AppError;
use crate::services::SessionUser;
use crate::state::AppState;
use actix_web::{web, FromRequest, HttpRequest};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

/// Equality of two secrets without an early exit on the first differing
/// byte: both sides are MACed under the expected secret and the tags are
/// compared with `verify_slice`.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
  let Ok(mut reference) = Hmac::<Sha1>::new_from_slice(expected.as_bytes()) else {
    return false;
  };
  let mut candidate = reference.clone();
  reference.update(expected.as_bytes());
  candidate.update(provided.as_bytes());
  let tag = reference.finalize().into_bytes();
  candidate.verify_slice(&tag).is_ok()
}

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
  req
    .app_data::<web::Data<AppState>>()
    .cloned()
    .ok_or_else(|| AppError::Internal("Application state missing".to_string()))
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
  req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn internal_secret_ok(state: &AppState, provided: &str) -> Result<(), AppError> {
  let Some(expected) = state.config.internal_api_secret.as_deref() else {
    warn!("Internal secret presented but INTERNAL_API_SECRET is not configured.");
    return Err(AppError::Unauthorized("Internal access is disabled".to_string()));
  };
  if !secrets_match(expected, provided) {
    warn!("Invalid internal secret.");
    return Err(AppError::Unauthorized("Invalid internal secret".to_string()));
  }
  Ok(())
}

/// A server-side caller holding the shared internal secret.
#[derive(Debug)]
pub struct InternalCaller;

impl FromRequest for InternalCaller {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let result = app_state(req).and_then(|state| {
      let provided = header(req, INTERNAL_SECRET_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing internal secret".to_string()))?;
      internal_secret_ok(&state, provided).map(|_| InternalCaller)
    });
    futures_util::future::ready(result)
  }
}

#[derive(Debug)]
pub enum AdminCaller {
  Internal,
  Session(SessionUser),
}

/// Internal secret, or a bearer session whose user has the `admin` role.
impl FromRequest for AdminCaller {
  type Error = AppError;
  type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let state = app_state(req);
    let secret = header(req, INTERNAL_SECRET_HEADER).map(str::to_string);
    let bearer = header(req, "authorization")
      .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
      .map(|t| t.trim().to_string())
      .filter(|t| !t.is_empty());

    Box::pin(async move {
      let state = state?;
      if let Some(secret) = secret {
        internal_secret_ok(&state, &secret)?;
        return Ok(AdminCaller::Internal);
      }
      let Some(token) = bearer else {
        return Err(AppError::Unauthorized("Authentication required".to_string()));
      };
      let user = state.sessions.verify(&token).await?;
      if !user.is_admin() {
        warn!(user_id = %user.id, "Non-admin session on admin endpoint.");
        return Err(AppError::Forbidden("Admin role required".to_string()));
      }
      Ok(AdminCaller::Session(user))
    })
  }
}
