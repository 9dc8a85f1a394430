// caisse/src/state.rs

use crate::config::{AppConfig, StoreBackend};
use crate::errors::{AppError, Result};
use crate::flows;
use crate::ledger::PaymentLedger;
use crate::services::{
  DraftSink, HttpDraftSink, HttpNotifier, HttpSessionVerifier, LogOnlySink, Notifier, RetryPolicy, SessionVerifier,
  ShippingDraftQueue,
};
use crate::store::{IntentStore, MemoryStore, OrderStore, PgStore};
use caisse_flow::FlowRegistry;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

/// Everything a handler or flow step needs, shared by cheap clones.
#[derive(Clone)]
pub struct AppState {
  pub orders: Arc<dyn OrderStore>,
  pub ledger: PaymentLedger,
  pub flows: Arc<FlowRegistry<AppError>>,
  pub config: Arc<AppConfig>,
  pub shipping: ShippingDraftQueue,
  pub notifier: Arc<dyn Notifier>,
  pub sessions: Arc<dyn SessionVerifier>,
}

/// External collaborators an [`AppState`] is assembled from.
pub struct Collaborators {
  pub orders: Arc<dyn OrderStore>,
  pub intents: Arc<dyn IntentStore>,
  pub draft_sink: Arc<dyn DraftSink>,
  pub notifier: Arc<dyn Notifier>,
  pub sessions: Arc<dyn SessionVerifier>,
}

impl AppState {
  /// Registers every flow and starts the shipping-draft worker. Must run
  /// inside a tokio runtime.
  pub fn assemble(config: AppConfig, collaborators: Collaborators) -> Result<Self> {
    let registry = FlowRegistry::<AppError>::new();
    flows::register_all_flows(&registry)?;

    let shipping = ShippingDraftQueue::start(
      collaborators.draft_sink,
      RetryPolicy::new(config.shipping_draft_max_attempts),
    );

    Ok(Self {
      orders: collaborators.orders,
      ledger: PaymentLedger::new(collaborators.intents),
      flows: Arc::new(registry),
      config: Arc::new(config),
      shipping,
      notifier: collaborators.notifier,
      sessions: collaborators.sessions,
    })
  }

  /// Builds the production state described by `config`: store backend,
  /// HTTP clients for the external services.
  pub async fn from_config(config: AppConfig) -> Result<Self> {
    let (orders, intents): (Arc<dyn OrderStore>, Arc<dyn IntentStore>) = match config.store_backend {
      StoreBackend::Postgres => {
        let database_url = config
          .database_url
          .as_deref()
          .ok_or_else(|| AppError::Config("DATABASE_URL is required for the postgres store".to_string()))?;
        let pool = PgPoolOptions::new()
          .max_connections(10)
          .acquire_timeout(Duration::from_secs(5))
          .connect(database_url)
          .await?;
        tracing::info!("Successfully connected to the database.");
        let store = Arc::new(PgStore::new(pool));
        if config.run_migrations {
          store.run_migrations().await?;
          tracing::info!("Database migrations applied.");
        }
        let orders: Arc<dyn OrderStore> = store.clone();
        let intents: Arc<dyn IntentStore> = store;
        (orders, intents)
      }
      StoreBackend::Memory => {
        tracing::warn!("Using the in-memory store; data is lost on restart.");
        let store = Arc::new(MemoryStore::new());
        let orders: Arc<dyn OrderStore> = store.clone();
        let intents: Arc<dyn IntentStore> = store;
        (orders, intents)
      }
    };

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()
      .map_err(|e| AppError::Config(format!("HTTP client: {}", e)))?;

    let draft_sink: Arc<dyn DraftSink> = match &config.shipping_draft_url {
      Some(url) => Arc::new(HttpDraftSink::new(client.clone(), url.clone())),
      None => Arc::new(LogOnlySink),
    };
    let notifier = Arc::new(HttpNotifier::new(
      client.clone(),
      config.notify_url.clone(),
      config.notify_sender.clone(),
    ));
    let sessions = Arc::new(HttpSessionVerifier::new(
      client,
      config.auth_base_url.clone(),
      config.auth_api_key.clone(),
    ));

    Self::assemble(
      config,
      Collaborators {
        orders,
        intents,
        draft_sink,
        notifier,
        sessions,
      },
    )
  }

  /// In-memory state with no outbound services, for tests and local runs.
  /// Returns the store too so callers can seed and inspect it.
  pub fn in_memory(monetico_key: Option<&str>) -> Result<(Self, Arc<MemoryStore>)> {
    let config = AppConfig::for_memory_store("http://localhost:3000", monetico_key);
    let store = Arc::new(MemoryStore::new());
    let client = reqwest::Client::new();
    let state = Self::assemble(
      config,
      Collaborators {
        orders: store.clone(),
        intents: store.clone(),
        draft_sink: Arc::new(LogOnlySink),
        notifier: Arc::new(HttpNotifier::new(client.clone(), None, "noreply@example.com".to_string())),
        sessions: Arc::new(HttpSessionVerifier::new(client, None, None)),
      },
    )?;
    Ok((state, store))
  }
}
