// caisse/src/store/postgres.rs

use super::{IntentStore, OrderStore};
use crate::errors::{AppError, Result};
use crate::models::{
  DeliveryType, IntentStatus, Order, OrderInput, OrderLineItem, OrderStatus, PaymentIntent, PickupPoint, Provider,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, reference, total, status, payment_method, items, delivery_type, pickup_point, \
   monetico_reference, shipping_cost, comment, customer_email, user_id, provider_transaction_id, created_at, updated_at";

const INTENT_COLUMNS: &str =
  "id, provider, provider_order_id, status, order_id, payload, last_error, created_at, processed_at";

#[derive(Debug, FromRow)]
struct OrderRow {
  id: Uuid,
  reference: String,
  total: Decimal,
  status: OrderStatus,
  payment_method: Option<String>,
  items: Json<Vec<OrderLineItem>>,
  delivery_type: DeliveryType,
  pickup_point: Option<Json<PickupPoint>>,
  monetico_reference: Option<String>,
  shipping_cost: Decimal,
  comment: Option<String>,
  customer_email: Option<String>,
  user_id: Option<String>,
  provider_transaction_id: Option<String>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
  fn from(row: OrderRow) -> Self {
    Order {
      id: row.id,
      reference: row.reference,
      total: row.total,
      status: row.status,
      payment_method: row.payment_method,
      items: row.items.0,
      delivery_type: row.delivery_type,
      pickup_point: row.pickup_point.map(|p| p.0),
      monetico_reference: row.monetico_reference,
      shipping_cost: row.shipping_cost,
      comment: row.comment,
      customer_email: row.customer_email,
      user_id: row.user_id,
      provider_transaction_id: row.provider_transaction_id,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

#[derive(Debug, FromRow)]
struct IntentRow {
  id: Uuid,
  provider: Provider,
  provider_order_id: String,
  status: IntentStatus,
  order_id: Option<Uuid>,
  payload: Json<OrderInput>,
  last_error: Option<String>,
  created_at: DateTime<Utc>,
  processed_at: Option<DateTime<Utc>>,
}

impl From<IntentRow> for PaymentIntent {
  fn from(row: IntentRow) -> Self {
    PaymentIntent {
      id: row.id,
      provider: row.provider,
      provider_order_id: row.provider_order_id,
      status: row.status,
      order_id: row.order_id,
      payload: row.payload.0,
      last_error: row.last_error,
      created_at: row.created_at,
      processed_at: row.processed_at,
    }
  }
}

/// Postgres-backed store using runtime-checked queries.
#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn run_migrations(&self) -> Result<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))
  }
}

/// Names the column whose unique constraint was hit, falling back to `reference`.
fn clash_message(constraint: Option<&str>, order: &Order) -> String {
  match (constraint, order.monetico_reference.as_deref()) {
    (Some(name), Some(monetico_reference)) if name.contains("monetico_reference") => {
      format!("An order with Monetico reference '{}' already exists", monetico_reference)
    }
    _ => format!("An order with reference '{}' already exists", order.reference),
  }
}

fn unique_violation_as_validation(err: sqlx::Error, order: &Order) -> AppError {
  if let sqlx::Error::Database(db_err) = &err {
    if db_err.is_unique_violation() {
      return AppError::Validation(clash_message(db_err.constraint(), order));
    }
  }
  AppError::Sqlx(err)
}

#[async_trait]
impl OrderStore for PgStore {
  #[instrument(name = "PgStore::insert_order", skip_all, fields(reference = %order.reference))]
  async fn insert_order(&self, order: &Order) -> Result<Order> {
    let sql = format!(
      "INSERT INTO orders ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
       RETURNING {cols}",
      cols = ORDER_COLUMNS
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(order.id)
      .bind(&order.reference)
      .bind(order.total)
      .bind(order.status)
      .bind(&order.payment_method)
      .bind(Json(&order.items))
      .bind(order.delivery_type)
      .bind(order.pickup_point.as_ref().map(Json))
      .bind(&order.monetico_reference)
      .bind(order.shipping_cost)
      .bind(&order.comment)
      .bind(&order.customer_email)
      .bind(&order.user_id)
      .bind(&order.provider_transaction_id)
      .bind(order.created_at)
      .bind(order.updated_at)
      .fetch_one(&self.pool)
      .await
      .map_err(|e| unique_violation_as_validation(e, order))?;
    Ok(row.into())
  }

  async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(Order::from))
  }

  async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE reference = $1", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(reference)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(Order::from))
  }

  async fn find_order_by_monetico_reference(&self, reference: &str) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE monetico_reference = $1", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(reference)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(Order::from))
  }

  #[instrument(name = "PgStore::complete_if_pending", skip(self))]
  async fn complete_if_pending(&self, id: Uuid, provider_transaction_id: Option<&str>) -> Result<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET status = 'completed', \
         provider_transaction_id = COALESCE($2, provider_transaction_id), updated_at = now() \
       WHERE id = $1 AND status = 'pending' RETURNING {}",
      ORDER_COLUMNS
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(id)
      .bind(provider_transaction_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(Order::from))
  }
}

#[async_trait]
impl IntentStore for PgStore {
  #[instrument(name = "PgStore::insert_or_get_intent", skip(self, payload))]
  async fn insert_or_get_intent(
    &self,
    provider: Provider,
    provider_order_id: &str,
    payload: &OrderInput,
  ) -> Result<PaymentIntent> {
    let sql = format!(
      "INSERT INTO payment_intents (id, provider, provider_order_id, status, payload) \
       VALUES ($1, $2, $3, 'pending', $4) \
       ON CONFLICT (provider, provider_order_id) DO NOTHING RETURNING {}",
      INTENT_COLUMNS
    );
    let inserted = sqlx::query_as::<_, IntentRow>(&sql)
      .bind(Uuid::new_v4())
      .bind(provider)
      .bind(provider_order_id)
      .bind(Json(payload))
      .fetch_optional(&self.pool)
      .await?;
    if let Some(row) = inserted {
      return Ok(row.into());
    }
    self
      .find_intent_by_provider_order_id(provider, provider_order_id)
      .await?
      .ok_or_else(|| AppError::Internal(format!("Intent {} vanished after conflict", provider_order_id)))
  }

  async fn find_intent(&self, id: Uuid) -> Result<Option<PaymentIntent>> {
    let sql = format!("SELECT {} FROM payment_intents WHERE id = $1", INTENT_COLUMNS);
    let row = sqlx::query_as::<_, IntentRow>(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(PaymentIntent::from))
  }

  async fn find_intent_by_provider_order_id(
    &self,
    provider: Provider,
    provider_order_id: &str,
  ) -> Result<Option<PaymentIntent>> {
    let sql = format!(
      "SELECT {} FROM payment_intents WHERE provider = $1 AND provider_order_id = $2",
      INTENT_COLUMNS
    );
    let row = sqlx::query_as::<_, IntentRow>(&sql)
      .bind(provider)
      .bind(provider_order_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(PaymentIntent::from))
  }

  async fn set_captured(&self, provider: Provider, provider_order_id: &str) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE payment_intents SET status = 'captured' \
       WHERE provider = $1 AND provider_order_id = $2 AND status IN ('pending', 'failed')",
    )
    .bind(provider)
    .bind(provider_order_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn set_failed(&self, provider: Provider, provider_order_id: &str, reason: &str) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE payment_intents SET status = 'failed', last_error = $3 \
       WHERE provider = $1 AND provider_order_id = $2 AND order_id IS NULL",
    )
    .bind(provider)
    .bind(provider_order_id)
    .bind(reason)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn set_order_link(&self, provider: Provider, provider_order_id: &str, order_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE payment_intents SET order_id = $3, status = 'captured', processed_at = now() \
       WHERE provider = $1 AND provider_order_id = $2 AND order_id IS NULL",
    )
    .bind(provider)
    .bind(provider_order_id)
    .bind(order_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn list_intents(&self, status: IntentStatus, unlinked_only: bool, limit: i64) -> Result<Vec<PaymentIntent>> {
    let sql = format!(
      "SELECT {} FROM payment_intents WHERE status = $1 AND ($2 = false OR order_id IS NULL) \
       ORDER BY created_at DESC LIMIT $3",
      INTENT_COLUMNS
    );
    let rows = sqlx::query_as::<_, IntentRow>(&sql)
      .bind(status)
      .bind(unlinked_only)
      .bind(limit)
      .fetch_all(&self.pool)
      .await?;
    Ok(rows.into_iter().map(PaymentIntent::from).collect())
  }
}
