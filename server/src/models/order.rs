// caisse/src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type as SqlxType;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Completed,
  Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "delivery_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
  Home,
  Relay,
}

/// Relay pickup location. Missing fields deserialize as empty strings so
/// delivery validation can name them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PickupPoint {
  pub id: String,
  pub name: Option<String>,
  pub address1: String,
  pub address2: Option<String>,
  pub zip: String,
  pub city: String,
  pub country_code: String,
}

impl PickupPoint {
  /// Names of the required fields that are blank.
  pub fn blank_fields(&self) -> Vec<&'static str> {
    [
      ("id", &self.id),
      ("address1", &self.address1),
      ("zip", &self.zip),
      ("city", &self.city),
      ("countryCode", &self.country_code),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect()
  }
}

/// Persisted line item. Descriptive attributes are copied at order time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
  pub id: Uuid,
  pub product_id: String,
  pub variant_id: Option<String>,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub name: Option<String>,
  pub image: Option<String>,
  #[serde(default)]
  pub attributes: BTreeMap<String, String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub reference: String,
  pub total: Decimal,
  pub status: OrderStatus,
  pub payment_method: Option<String>,
  pub items: Vec<OrderLineItem>,
  pub delivery_type: DeliveryType,
  pub pickup_point: Option<PickupPoint>,
  pub monetico_reference: Option<String>,
  pub shipping_cost: Decimal,
  pub comment: Option<String>,
  pub customer_email: Option<String>,
  pub user_id: Option<String>,
  pub provider_transaction_id: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Line item as submitted by checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
  pub product_id: String,
  #[serde(default)]
  pub variant_id: Option<String>,
  pub quantity: i32,
  pub unit_price: Decimal,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub flavor: Option<String>,
  #[serde(default)]
  pub size: Option<String>,
  #[serde(default)]
  pub color: Option<String>,
  #[serde(default)]
  pub attributes: BTreeMap<String, String>,
}

/// Everything needed to create an order. Also the immutable payload a
/// payment intent keeps for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
  #[serde(default)]
  pub user_id: Option<String>,
  pub reference: String,
  pub total: Decimal,
  #[serde(default)]
  pub items: Vec<OrderItemInput>,
  #[serde(default)]
  pub payment_method: Option<String>,
  #[serde(default)]
  pub shipping_cost: Option<Decimal>,
  #[serde(default)]
  pub comment: Option<String>,
  #[serde(default)]
  pub monetico_reference: Option<String>,
  #[serde(default)]
  pub customer_email: Option<String>,
  pub delivery_type: DeliveryType,
  #[serde(default)]
  pub pickup_point: Option<PickupPoint>,
}
