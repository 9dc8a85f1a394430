// caisse/src/services/shipping.rs

//! Shipping-draft queue. Order creation only enqueues; a worker task drains
//! the queue and delivers each draft with its own retry policy.

use crate::errors::{AppError, Result};
use crate::models::{DeliveryType, Order, PickupPoint};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDraft {
  pub order_id: Uuid,
  pub reference: String,
  pub delivery_type: DeliveryType,
  pub pickup_point: Option<PickupPoint>,
  pub customer_email: Option<String>,
  pub item_count: i32,
}

impl From<&Order> for ShippingDraft {
  fn from(order: &Order) -> Self {
    ShippingDraft {
      order_id: order.id,
      reference: order.reference.clone(),
      delivery_type: order.delivery_type,
      pickup_point: order.pickup_point.clone(),
      customer_email: order.customer_email.clone(),
      item_count: order.items.iter().map(|i| i.quantity).sum(),
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_delay: Duration,
}

impl RetryPolicy {
  pub fn new(max_attempts: u32) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      base_delay: Duration::from_millis(500),
    }
  }

  /// Delay after the given failed attempt (1-based): doubles each time.
  pub fn backoff(&self, attempt: u32) -> Duration {
    self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
  }
}

/// Where drafts end up.
#[async_trait]
pub trait DraftSink: Send + Sync {
  async fn deliver(&self, draft: &ShippingDraft) -> Result<()>;
}

/// POSTs drafts as JSON to the shipping service.
pub struct HttpDraftSink {
  client: reqwest::Client,
  url: String,
}

impl HttpDraftSink {
  pub fn new(client: reqwest::Client, url: String) -> Self {
    Self { client, url }
  }
}

#[async_trait]
impl DraftSink for HttpDraftSink {
  async fn deliver(&self, draft: &ShippingDraft) -> Result<()> {
    let response = self.client.post(&self.url).json(draft).send().await?;
    if !response.status().is_success() {
      return Err(AppError::Upstream(format!(
        "shipping service answered {}",
        response.status()
      )));
    }
    Ok(())
  }
}

/// Used when no shipping service is configured.
pub struct LogOnlySink;

#[async_trait]
impl DraftSink for LogOnlySink {
  async fn deliver(&self, draft: &ShippingDraft) -> Result<()> {
    info!(order_id = %draft.order_id, reference = %draft.reference, "No shipping service configured, draft dropped.");
    Ok(())
  }
}

#[derive(Clone)]
pub struct ShippingDraftQueue {
  sender: mpsc::Sender<ShippingDraft>,
}

impl ShippingDraftQueue {
  /// Starts the delivery worker on the current tokio runtime.
  pub fn start(sink: Arc<dyn DraftSink>, policy: RetryPolicy) -> Self {
    let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
    tokio::spawn(run_worker(receiver, sink, policy));
    Self { sender }
  }

  /// Hands a draft to the worker without waiting for delivery.
  pub fn enqueue(&self, draft: ShippingDraft) -> Result<()> {
    self.sender.try_send(draft).map_err(|e| match e {
      mpsc::error::TrySendError::Full(d) => {
        AppError::Upstream(format!("shipping draft queue full, dropped {}", d.reference))
      }
      mpsc::error::TrySendError::Closed(d) => {
        AppError::Upstream(format!("shipping draft worker stopped, dropped {}", d.reference))
      }
    })
  }
}

async fn run_worker(mut receiver: mpsc::Receiver<ShippingDraft>, sink: Arc<dyn DraftSink>, policy: RetryPolicy) {
  debug!("Shipping draft worker started.");
  while let Some(draft) = receiver.recv().await {
    deliver_with_retry(sink.as_ref(), &draft, policy).await;
  }
  debug!("Shipping draft queue closed, worker exiting.");
}

/// Returns whether the draft was delivered.
#[instrument(name = "shipping::deliver", skip_all, fields(order_id = %draft.order_id, reference = %draft.reference))]
pub async fn deliver_with_retry(sink: &dyn DraftSink, draft: &ShippingDraft, policy: RetryPolicy) -> bool {
  for attempt in 1..=policy.max_attempts {
    match sink.deliver(draft).await {
      Ok(()) => {
        info!(attempt, "Shipping draft delivered.");
        return true;
      }
      Err(e) if attempt < policy.max_attempts => {
        let delay = policy.backoff(attempt);
        warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Shipping draft delivery failed, retrying.");
        tokio::time::sleep(delay).await;
      }
      Err(e) => {
        error!(attempt, error = %e, "Shipping draft delivery failed, giving up.");
      }
    }
  }
  false
}
