// caisse/src/models/payment_intent.rs

use super::order::OrderInput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type as SqlxType;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
  Paypal,
  Monetico,
}

impl std::fmt::Display for Provider {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Provider::Paypal => f.write_str("paypal"),
      Provider::Monetico => f.write_str("monetico"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "intent_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
  Pending,
  Captured,
  Failed,
}

/// One payment attempt as seen by a provider.
///
/// `Captured` with no `order_id` is an orphan: the provider took the money
/// but no order was recorded. `Failed` never carries an `order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
  pub id: Uuid,
  pub provider: Provider,
  pub provider_order_id: String,
  pub status: IntentStatus,
  pub order_id: Option<Uuid>,
  pub payload: OrderInput,
  pub last_error: Option<String>,
  pub created_at: DateTime<Utc>,
  pub processed_at: Option<DateTime<Utc>>,
}

impl PaymentIntent {
  pub fn is_orphan(&self) -> bool {
    (self.status == IntentStatus::Captured && self.order_id.is_none()) || self.status == IntentStatus::Failed
  }
}
