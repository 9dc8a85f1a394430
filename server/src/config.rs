// caisse/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;

const DEFAULT_MONETICO_PAYMENT_URL: &str = "https://p.monetico-services.com/paiement.cgi";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

/// Merchant-side Monetico settings. The key stays a raw string here and is
/// parsed per request, so a malformed key fails the request rather than boot.
#[derive(Clone, Default)]
pub struct MoneticoConfig {
  pub key: Option<String>,
  pub tpe: String,
  pub societe: String,
  pub version: String,
  pub lang: String,
  pub payment_url: String,
}

impl std::fmt::Debug for MoneticoConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MoneticoConfig")
      .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
      .field("tpe", &self.tpe)
      .field("societe", &self.societe)
      .field("version", &self.version)
      .field("lang", &self.lang)
      .field("payment_url", &self.payment_url)
      .finish()
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub store_backend: StoreBackend,
  pub database_url: Option<String>,
  pub run_migrations: bool,
  pub site_url: String,

  pub monetico: MoneticoConfig,

  pub internal_api_secret: Option<String>,
  pub auth_base_url: Option<String>,
  pub auth_api_key: Option<String>,

  pub shipping_draft_url: Option<String>,
  pub shipping_draft_max_attempts: u32,

  pub notify_url: Option<String>,
  pub notify_sender: String,

  pub orphan_page_size: i64,
  pub log_json: bool,
}

impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("store_backend", &self.store_backend)
      .field("site_url", &self.site_url)
      .field("monetico", &self.monetico)
      .field("internal_api_secret", &self.internal_api_secret.as_ref().map(|_| "[REDACTED]"))
      .field("auth_base_url", &self.auth_base_url)
      .field("shipping_draft_url", &self.shipping_draft_url)
      .field("notify_url", &self.notify_url)
      .field("orphan_page_size", &self.orphan_page_size)
      .finish_non_exhaustive()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| {
      env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

    let store_backend = match get_env("STORE_BACKEND").as_deref() {
      None | Some("postgres") => StoreBackend::Postgres,
      Some("memory") => StoreBackend::Memory,
      Some(other) => return Err(AppError::Config(format!("Unknown STORE_BACKEND '{}'", other))),
    };
    let database_url = get_env("DATABASE_URL");
    if store_backend == StoreBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL'".to_string(),
      ));
    }
    let run_migrations = parse_bool("RUN_MIGRATIONS", get_env("RUN_MIGRATIONS"), false)?;

    let site_url = get_env("SITE_URL")
      .unwrap_or_else(|| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();

    let monetico = MoneticoConfig {
      key: get_env("MONETICO_KEY"),
      tpe: get_env("MONETICO_TPE").unwrap_or_default(),
      societe: get_env("MONETICO_SOCIETE").unwrap_or_default(),
      version: get_env("MONETICO_VERSION").unwrap_or_else(|| "3.0".to_string()),
      lang: get_env("MONETICO_LANG").unwrap_or_else(|| "FR".to_string()),
      payment_url: get_env("MONETICO_PAYMENT_URL").unwrap_or_else(|| DEFAULT_MONETICO_PAYMENT_URL.to_string()),
    };

    let shipping_draft_max_attempts = get_env("SHIPPING_DRAFT_MAX_ATTEMPTS")
      .unwrap_or_else(|| "3".to_string())
      .parse::<u32>()
      .map_err(|e| AppError::Config(format!("Invalid SHIPPING_DRAFT_MAX_ATTEMPTS: {}", e)))?;
    let orphan_page_size = get_env("ORPHAN_PAGE_SIZE")
      .unwrap_or_else(|| "50".to_string())
      .parse::<i64>()
      .map_err(|e| AppError::Config(format!("Invalid ORPHAN_PAGE_SIZE: {}", e)))?;
    if orphan_page_size <= 0 {
      return Err(AppError::Config("ORPHAN_PAGE_SIZE must be positive".to_string()));
    }

    let config = Self {
      server_host,
      server_port,
      store_backend,
      database_url,
      run_migrations,
      site_url,
      monetico,
      internal_api_secret: get_env("INTERNAL_API_SECRET"),
      auth_base_url: get_env("AUTH_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
      auth_api_key: get_env("AUTH_API_KEY"),
      shipping_draft_url: get_env("SHIPPING_DRAFT_URL"),
      shipping_draft_max_attempts,
      notify_url: get_env("NOTIFY_URL"),
      notify_sender: get_env("NOTIFY_SENDER").unwrap_or_else(|| "noreply@example.com".to_string()),
      orphan_page_size,
      log_json: get_env("LOG_FORMAT").as_deref() == Some("json"),
    };

    tracing::info!(config = ?config, "Application configuration loaded.");
    Ok(config)
  }

  /// Configuration for in-process use (tests, local demos): in-memory store,
  /// no outbound services.
  pub fn for_memory_store(site_url: &str, monetico_key: Option<&str>) -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 0,
      store_backend: StoreBackend::Memory,
      database_url: None,
      run_migrations: false,
      site_url: site_url.trim_end_matches('/').to_string(),
      monetico: MoneticoConfig {
        key: monetico_key.map(str::to_string),
        tpe: "1234567".to_string(),
        societe: "boutique".to_string(),
        version: "3.0".to_string(),
        lang: "FR".to_string(),
        payment_url: DEFAULT_MONETICO_PAYMENT_URL.to_string(),
      },
      internal_api_secret: None,
      auth_base_url: None,
      auth_api_key: None,
      shipping_draft_url: None,
      shipping_draft_max_attempts: 3,
      notify_url: None,
      notify_sender: "noreply@example.com".to_string(),
      orphan_page_size: 50,
      log_json: false,
    }
  }
}

fn parse_bool(name: &str, raw: Option<String>, default: bool) -> Result<bool> {
  match raw {
    None => Ok(default),
    Some(v) => v
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid {} value: {}", name, e))),
  }
}
