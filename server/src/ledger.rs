// caisse/src/ledger.rs

//! Payment intent ledger: one row per provider payment attempt, carrying the
//! order payload needed to rebuild the order later.

use crate::errors::{AppError, Result};
use crate::models::{OrderInput, PaymentIntent, Provider};
use crate::store::IntentStore;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentLedger {
  store: Arc<dyn IntentStore>,
}

impl PaymentLedger {
  pub fn new(store: Arc<dyn IntentStore>) -> Self {
    Self { store }
  }

  /// Records a pending attempt. Recording the same provider order twice
  /// returns the first row unchanged.
  #[instrument(name = "ledger::record_attempt", skip(self, payload), fields(reference = %payload.reference))]
  pub async fn record_attempt(
    &self,
    provider: Provider,
    provider_order_id: &str,
    payload: &OrderInput,
  ) -> Result<PaymentIntent> {
    if provider_order_id.trim().is_empty() {
      return Err(AppError::Validation("providerOrderId is required".to_string()));
    }
    let intent = self.store.insert_or_get_intent(provider, provider_order_id, payload).await?;
    info!(intent_id = %intent.id, status = ?intent.status, "Payment attempt recorded.");
    Ok(intent)
  }

  /// `pending | failed -> captured`. Capturing twice is a no-op.
  #[instrument(name = "ledger::mark_captured", skip(self))]
  pub async fn mark_captured(&self, provider: Provider, provider_order_id: &str) -> Result<()> {
    if self.store.set_captured(provider, provider_order_id).await? {
      info!("Payment intent captured.");
      return Ok(());
    }
    self.require(provider, provider_order_id).await?;
    Ok(())
  }

  /// Records a failure reason. A linked intent keeps its state: failed
  /// intents never point at an order.
  #[instrument(name = "ledger::mark_failed", skip(self))]
  pub async fn mark_failed(&self, provider: Provider, provider_order_id: &str, reason: &str) -> Result<()> {
    if self.store.set_failed(provider, provider_order_id, reason).await? {
      warn!(reason, "Payment intent marked failed.");
      return Ok(());
    }
    let intent = self.require(provider, provider_order_id).await?;
    warn!(order_id = ?intent.order_id, reason, "Intent already linked to an order, failure not recorded.");
    Ok(())
  }

  /// Links the intent to its order at most once. An intent that is already
  /// linked counts as success.
  #[instrument(name = "ledger::link_order", skip(self))]
  pub async fn link_order(&self, provider: Provider, provider_order_id: &str, order_id: Uuid) -> Result<()> {
    if self.store.set_order_link(provider, provider_order_id, order_id).await? {
      info!("Payment intent linked to order.");
      return Ok(());
    }
    let intent = self.require(provider, provider_order_id).await?;
    if intent.order_id != Some(order_id) {
      warn!(existing_order_id = ?intent.order_id, "Intent was already linked to another order.");
    }
    Ok(())
  }

  pub async fn get(&self, id: Uuid) -> Result<Option<PaymentIntent>> {
    self.store.find_intent(id).await
  }

  pub async fn find(&self, provider: Provider, provider_order_id: &str) -> Result<Option<PaymentIntent>> {
    self.store.find_intent_by_provider_order_id(provider, provider_order_id).await
  }

  pub(crate) fn store(&self) -> &Arc<dyn IntentStore> {
    &self.store
  }

  async fn require(&self, provider: Provider, provider_order_id: &str) -> Result<PaymentIntent> {
    self.find(provider, provider_order_id).await?.ok_or_else(|| {
      AppError::NotFound(format!(
        "No {} payment intent for provider order {}",
        provider, provider_order_id
      ))
    })
  }
}
