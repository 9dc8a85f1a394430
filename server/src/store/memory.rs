// caisse/src/store/memory.rs

use super::{IntentStore, OrderStore};
use crate::errors::{AppError, Result};
use crate::models::{IntentStatus, Order, OrderInput, OrderStatus, PaymentIntent, Provider};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process store for local runs and tests.
///
/// Every trait call bumps an access counter, and all calls can be made to
/// fail with an upstream error.
#[derive(Default)]
pub struct MemoryStore {
  orders: RwLock<Vec<Order>>,
  intents: RwLock<Vec<PaymentIntent>>,
  accesses: AtomicUsize,
  fail_all: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of store calls made so far.
  pub fn access_count(&self) -> usize {
    self.accesses.load(Ordering::SeqCst)
  }

  pub fn set_fail_all(&self, fail: bool) {
    self.fail_all.store(fail, Ordering::SeqCst);
  }

  pub async fn order_count(&self) -> usize {
    self.orders.read().await.len()
  }

  /// Test seeding hook that bypasses uniqueness checks and the counter.
  pub async fn seed_order(&self, order: Order) {
    self.orders.write().await.push(order);
  }

  pub async fn seed_intent(&self, intent: PaymentIntent) {
    self.intents.write().await.push(intent);
  }

  fn touch(&self) -> Result<()> {
    self.accesses.fetch_add(1, Ordering::SeqCst);
    if self.fail_all.load(Ordering::SeqCst) {
      return Err(AppError::Upstream("memory store unavailable".to_string()));
    }
    Ok(())
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn insert_order(&self, order: &Order) -> Result<Order> {
    self.touch()?;
    let mut orders = self.orders.write().await;
    if orders.iter().any(|o| o.reference == order.reference) {
      return Err(AppError::Validation(format!(
        "An order with reference '{}' already exists",
        order.reference
      )));
    }
    if let Some(monetico_ref) = &order.monetico_reference {
      if orders.iter().any(|o| o.monetico_reference.as_ref() == Some(monetico_ref)) {
        return Err(AppError::Validation(format!(
          "An order with Monetico reference '{}' already exists",
          monetico_ref
        )));
      }
    }
    orders.push(order.clone());
    Ok(order.clone())
  }

  async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
    self.touch()?;
    Ok(self.orders.read().await.iter().find(|o| o.id == id).cloned())
  }

  async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>> {
    self.touch()?;
    Ok(self.orders.read().await.iter().find(|o| o.reference == reference).cloned())
  }

  async fn find_order_by_monetico_reference(&self, reference: &str) -> Result<Option<Order>> {
    self.touch()?;
    Ok(
      self
        .orders
        .read()
        .await
        .iter()
        .find(|o| o.monetico_reference.as_deref() == Some(reference))
        .cloned(),
    )
  }

  async fn complete_if_pending(&self, id: Uuid, provider_transaction_id: Option<&str>) -> Result<Option<Order>> {
    self.touch()?;
    let mut orders = self.orders.write().await;
    let Some(order) = orders.iter_mut().find(|o| o.id == id && o.status == OrderStatus::Pending) else {
      return Ok(None);
    };
    order.status = OrderStatus::Completed;
    if let Some(txn) = provider_transaction_id {
      order.provider_transaction_id = Some(txn.to_string());
    }
    order.updated_at = Utc::now();
    Ok(Some(order.clone()))
  }
}

#[async_trait]
impl IntentStore for MemoryStore {
  async fn insert_or_get_intent(
    &self,
    provider: Provider,
    provider_order_id: &str,
    payload: &OrderInput,
  ) -> Result<PaymentIntent> {
    self.touch()?;
    let mut intents = self.intents.write().await;
    if let Some(existing) = intents
      .iter()
      .find(|i| i.provider == provider && i.provider_order_id == provider_order_id)
    {
      return Ok(existing.clone());
    }
    let intent = PaymentIntent {
      id: Uuid::new_v4(),
      provider,
      provider_order_id: provider_order_id.to_string(),
      status: IntentStatus::Pending,
      order_id: None,
      payload: payload.clone(),
      last_error: None,
      created_at: Utc::now(),
      processed_at: None,
    };
    intents.push(intent.clone());
    Ok(intent)
  }

  async fn find_intent(&self, id: Uuid) -> Result<Option<PaymentIntent>> {
    self.touch()?;
    Ok(self.intents.read().await.iter().find(|i| i.id == id).cloned())
  }

  async fn find_intent_by_provider_order_id(
    &self,
    provider: Provider,
    provider_order_id: &str,
  ) -> Result<Option<PaymentIntent>> {
    self.touch()?;
    Ok(
      self
        .intents
        .read()
        .await
        .iter()
        .find(|i| i.provider == provider && i.provider_order_id == provider_order_id)
        .cloned(),
    )
  }

  async fn set_captured(&self, provider: Provider, provider_order_id: &str) -> Result<bool> {
    self.touch()?;
    let mut intents = self.intents.write().await;
    match intents.iter_mut().find(|i| {
      i.provider == provider
        && i.provider_order_id == provider_order_id
        && matches!(i.status, IntentStatus::Pending | IntentStatus::Failed)
    }) {
      Some(intent) => {
        intent.status = IntentStatus::Captured;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn set_failed(&self, provider: Provider, provider_order_id: &str, reason: &str) -> Result<bool> {
    self.touch()?;
    let mut intents = self.intents.write().await;
    match intents
      .iter_mut()
      .find(|i| i.provider == provider && i.provider_order_id == provider_order_id && i.order_id.is_none())
    {
      Some(intent) => {
        intent.status = IntentStatus::Failed;
        intent.last_error = Some(reason.to_string());
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn set_order_link(&self, provider: Provider, provider_order_id: &str, order_id: Uuid) -> Result<bool> {
    self.touch()?;
    let mut intents = self.intents.write().await;
    match intents
      .iter_mut()
      .find(|i| i.provider == provider && i.provider_order_id == provider_order_id && i.order_id.is_none())
    {
      Some(intent) => {
        intent.order_id = Some(order_id);
        intent.status = IntentStatus::Captured;
        intent.processed_at = Some(Utc::now());
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn list_intents(&self, status: IntentStatus, unlinked_only: bool, limit: i64) -> Result<Vec<PaymentIntent>> {
    self.touch()?;
    let limit = usize::try_from(limit).unwrap_or(0);
    let mut matching: Vec<PaymentIntent> = self
      .intents
      .read()
      .await
      .iter()
      .rev()
      .filter(|i| i.status == status && (!unlinked_only || i.order_id.is_none()))
      .cloned()
      .collect();
    // Stable sort: equal timestamps keep the later insertion first.
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    matching.truncate(limit);
    Ok(matching)
  }
}
