// caisse/src/services/notifier.rs

use crate::errors::{AppError, Result};
use crate::models::Order;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, instrument};

/// Customer-facing notifications sent after a verified payment.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn payment_confirmed(&self, order: &Order) -> Result<()>;
}

/// Sends through the external notification service over HTTP. With no URL
/// configured the notification is only logged.
pub struct HttpNotifier {
  client: reqwest::Client,
  url: Option<String>,
  sender: String,
}

impl HttpNotifier {
  pub fn new(client: reqwest::Client, url: Option<String>, sender: String) -> Self {
    Self { client, url, sender }
  }
}

#[async_trait]
impl Notifier for HttpNotifier {
  #[instrument(name = "notifier::payment_confirmed", skip_all, fields(reference = %order.reference))]
  async fn payment_confirmed(&self, order: &Order) -> Result<()> {
    let Some(recipient) = order.customer_email.as_deref() else {
      info!("Order has no customer email, skipping confirmation.");
      return Ok(());
    };
    let Some(url) = &self.url else {
      info!("No notification service configured, confirmation not sent.");
      return Ok(());
    };

    let body = json!({
      "from": self.sender,
      "to": recipient,
      "template": "payment_confirmed",
      "data": {
        "reference": order.reference,
        "total": order.total,
        "deliveryType": order.delivery_type,
      },
    });
    let response = self.client.post(url).json(&body).send().await?;
    if !response.status().is_success() {
      return Err(AppError::Upstream(format!(
        "notification service answered {}",
        response.status()
      )));
    }
    info!("Payment confirmation sent.");
    Ok(())
  }
}
