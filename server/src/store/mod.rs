// caisse/src/store/mod.rs

//! Persistence seams for the two tables this service owns.
//!
//! Every mutation is a single-row conditional write, so "apply at most once"
//! holds across processes without in-memory locks.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{IntentStatus, Order, OrderInput, PaymentIntent, Provider};
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Inserts a new order. A clash on `reference` or `monetico_reference`
  /// is a validation error.
  async fn insert_order(&self, order: &Order) -> Result<Order>;

  async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;

  async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>>;

  async fn find_order_by_monetico_reference(&self, reference: &str) -> Result<Option<Order>>;

  /// `pending -> completed`. Returns the updated order, or `None` when the
  /// order was no longer pending.
  async fn complete_if_pending(&self, id: Uuid, provider_transaction_id: Option<&str>) -> Result<Option<Order>>;
}

#[async_trait]
pub trait IntentStore: Send + Sync {
  /// Inserts a pending intent, or returns the existing row for the same
  /// `(provider, provider_order_id)`.
  async fn insert_or_get_intent(
    &self,
    provider: Provider,
    provider_order_id: &str,
    payload: &OrderInput,
  ) -> Result<PaymentIntent>;

  async fn find_intent(&self, id: Uuid) -> Result<Option<PaymentIntent>>;

  async fn find_intent_by_provider_order_id(
    &self,
    provider: Provider,
    provider_order_id: &str,
  ) -> Result<Option<PaymentIntent>>;

  /// Moves a `pending` or `failed` intent to `captured`. Returns whether a
  /// row changed.
  async fn set_captured(&self, provider: Provider, provider_order_id: &str) -> Result<bool>;

  /// Moves an unlinked intent to `failed` and records the reason.
  async fn set_failed(&self, provider: Provider, provider_order_id: &str, reason: &str) -> Result<bool>;

  /// Links an unlinked intent to an order, marking it captured and
  /// processed. Returns `false` when the intent was already linked.
  async fn set_order_link(&self, provider: Provider, provider_order_id: &str, order_id: Uuid) -> Result<bool>;

  /// Newest first, at most `limit` rows, in one of the two orphan classes.
  async fn list_intents(&self, status: IntentStatus, unlinked_only: bool, limit: i64) -> Result<Vec<PaymentIntent>>;
}
