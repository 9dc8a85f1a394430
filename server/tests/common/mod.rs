// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use caisse::config::AppConfig;
use caisse::errors::{AppError, Result as AppResult};
use caisse::models::{
  DeliveryType, IntentStatus, Order, OrderInput, OrderItemInput, OrderStatus, PaymentIntent, Provider,
};
use caisse::monetico::{mac, MacKey, MoneticoFields};
use caisse::services::{LogOnlySink, Notifier, SessionUser, SessionVerifier};
use caisse::state::{AppState, Collaborators};
use caisse::store::MemoryStore;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

pub const TEST_KEY: &str = "0123456789ABCDEF0123456789ABCDEF01234567";
pub const INTERNAL_SECRET: &str = "internal-test-secret";
pub const SITE_URL: &str = "https://shop.example";
pub const ADMIN_TOKEN: &str = "admin-session";
pub const CUSTOMER_TOKEN: &str = "customer-session";

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

/// Knows two tokens: one admin, one plain customer.
pub struct FakeSessions;

#[async_trait]
impl SessionVerifier for FakeSessions {
  async fn verify(&self, token: &str) -> AppResult<SessionUser> {
    match token {
      ADMIN_TOKEN => Ok(SessionUser {
        id: "admin-1".to_string(),
        email: Some("admin@shop.example".to_string()),
        role: Some("admin".to_string()),
      }),
      CUSTOMER_TOKEN => Ok(SessionUser {
        id: "customer-1".to_string(),
        email: Some("client@shop.example".to_string()),
        role: None,
      }),
      _ => Err(AppError::Unauthorized("Invalid session".to_string())),
    }
  }
}

#[derive(Default)]
pub struct CountingNotifier {
  pub sent: AtomicUsize,
}

impl CountingNotifier {
  pub fn count(&self) -> usize {
    self.sent.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Notifier for CountingNotifier {
  async fn payment_confirmed(&self, _order: &Order) -> AppResult<()> {
    self.sent.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

pub struct TestApp {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub notifier: Arc<CountingNotifier>,
}

/// In-memory state with the internal secret set and fake collaborators.
/// Must be called from inside a runtime.
pub fn test_app(monetico_key: Option<&str>) -> TestApp {
  setup_tracing();
  let mut config = AppConfig::for_memory_store(SITE_URL, monetico_key);
  config.internal_api_secret = Some(INTERNAL_SECRET.to_string());

  let store = Arc::new(MemoryStore::new());
  let notifier = Arc::new(CountingNotifier::default());
  let state = AppState::assemble(
    config,
    Collaborators {
      orders: store.clone(),
      intents: store.clone(),
      draft_sink: Arc::new(LogOnlySink),
      notifier: notifier.clone(),
      sessions: Arc::new(FakeSessions),
    },
  )
  .expect("state assembles");
  TestApp { state, store, notifier }
}

/// Return fields signed with `key_hex`, in the order a bank would send them.
pub fn signed_fields(key_hex: &str, reference: &str, code_retour: &str) -> Vec<(String, String)> {
  let mut pairs: Vec<(String, String)> = [
    ("TPE", "1234567"),
    ("date", "01/01/2025_10:00:00"),
    ("montant", "199.00EUR"),
    ("reference", reference),
    ("texte-libre", "commande"),
    ("version", "3.0"),
    ("code-retour", code_retour),
    ("numauto", "AUTH42"),
  ]
  .iter()
  .map(|(k, v)| (k.to_string(), v.to_string()))
  .collect();

  let key = MacKey::from_hex(key_hex).expect("valid key");
  let message = MoneticoFields::from_pairs(pairs.clone()).mac_message();
  pairs.push(("MAC".to_string(), mac::compute(&key, &message)));
  pairs
}

pub fn replace_field(pairs: &mut [(String, String)], name: &str, value: &str) {
  for (k, v) in pairs.iter_mut() {
    if k == name {
      *v = value.to_string();
    }
  }
}

pub fn form_body(pairs: &[(String, String)]) -> String {
  serde_urlencoded::to_string(pairs).expect("encodable")
}

pub fn order_input(reference: &str) -> OrderInput {
  OrderInput {
    user_id: Some("user-7".to_string()),
    reference: reference.to_string(),
    total: Decimal::new(19900, 2),
    items: vec![OrderItemInput {
      product_id: "prod-1".to_string(),
      variant_id: Some("var-1".to_string()),
      quantity: 2,
      unit_price: Decimal::new(9950, 2),
      name: Some("Whey vanille".to_string()),
      image: None,
      flavor: Some("vanille".to_string()),
      size: None,
      color: None,
      attributes: BTreeMap::new(),
    }],
    payment_method: Some("monetico".to_string()),
    shipping_cost: None,
    comment: None,
    monetico_reference: Some(reference.to_string()),
    customer_email: Some("client@shop.example".to_string()),
    delivery_type: DeliveryType::Home,
    pickup_point: None,
  }
}

pub fn order(reference: &str, status: OrderStatus) -> Order {
  let now = Utc::now();
  Order {
    id: Uuid::new_v4(),
    reference: reference.to_string(),
    total: Decimal::new(19900, 2),
    status,
    payment_method: Some("monetico".to_string()),
    items: Vec::new(),
    delivery_type: DeliveryType::Home,
    pickup_point: None,
    monetico_reference: Some(reference.to_string()),
    shipping_cost: Decimal::ZERO,
    comment: None,
    customer_email: Some("client@shop.example".to_string()),
    user_id: None,
    provider_transaction_id: None,
    created_at: now,
    updated_at: now,
  }
}

pub fn intent(
  provider_order_id: &str,
  status: IntentStatus,
  order_id: Option<Uuid>,
  created_at: DateTime<Utc>,
) -> PaymentIntent {
  PaymentIntent {
    id: Uuid::new_v4(),
    provider: Provider::Paypal,
    provider_order_id: provider_order_id.to_string(),
    status,
    order_id,
    payload: order_input(&format!("REF-{}", provider_order_id)),
    last_error: None,
    created_at,
    processed_at: None,
  }
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
  Utc::now() - Duration::minutes(minutes)
}
