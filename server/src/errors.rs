// caisse/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use caisse_flow::FlowError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub const MISSING_FIELDS_MESSAGE: &str = "Paramètres manquants";
pub const INVALID_SIGNATURE_MESSAGE: &str = "Signature invalide";

/// Machine-checkable discriminant carried by every [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  MissingFields,
  Configuration,
  SignatureInvalid,
  Validation,
  NotFound,
  Upstream,
  Unauthorized,
  Forbidden,
  Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Missing required fields: {}", .0.join(", "))]
  MissingFields(Vec<String>),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("MAC signature mismatch")]
  SignatureInvalid,

  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  NotFound(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Upstream service error: {0}")]
  Upstream(String),

  #[error("Unauthorized: {0}")]
  Unauthorized(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Flow Error: {source}")]
  Flow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      AppError::MissingFields(_) => ErrorKind::MissingFields,
      AppError::Config(_) => ErrorKind::Configuration,
      AppError::SignatureInvalid => ErrorKind::SignatureInvalid,
      AppError::Validation(_) => ErrorKind::Validation,
      AppError::NotFound(_) => ErrorKind::NotFound,
      AppError::Sqlx(_) | AppError::Upstream(_) => ErrorKind::Upstream,
      AppError::Unauthorized(_) => ErrorKind::Unauthorized,
      AppError::Forbidden(_) => ErrorKind::Forbidden,
      AppError::Flow { .. } | AppError::Internal(_) => ErrorKind::Internal,
    }
  }

  /// Message safe to show an operator. Store and engine internals are
  /// replaced by a generic line.
  pub fn public_message(&self) -> String {
    match self {
      AppError::MissingFields(_) => MISSING_FIELDS_MESSAGE.to_string(),
      AppError::SignatureInvalid => INVALID_SIGNATURE_MESSAGE.to_string(),
      AppError::Sqlx(_) => "Database operation failed".to_string(),
      AppError::Flow { .. } => "Workflow processing error".to_string(),
      other => other.to_string(),
    }
  }

  /// `{ok: false, error, kind}` body shared by order creation, replay and
  /// capture recording.
  pub fn failure_body(&self) -> serde_json::Value {
    json!({ "ok": false, "error": self.public_message(), "kind": self.kind() })
  }
}

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    AppError::Upstream(err.to_string())
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(db_err) => AppError::Sqlx(db_err),
      Err(err) => AppError::Internal(err.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self.kind() {
      ErrorKind::MissingFields | ErrorKind::SignatureInvalid | ErrorKind::Validation => StatusCode::BAD_REQUEST,
      ErrorKind::NotFound => StatusCode::NOT_FOUND,
      ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
      ErrorKind::Forbidden => StatusCode::FORBIDDEN,
      ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
      ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    tracing::error!(application_error = %self, kind = ?self.kind(), "Responding with error");
    HttpResponse::build(self.status_code()).json(json!({ "error": self.public_message() }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
