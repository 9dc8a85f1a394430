// caisse/src/monetico/form.rs

//! Outbound payment form: the field set the storefront posts to Monetico for
//! a pending order, signed with the same field-order contract used to check
//! returns.

use super::fields::mac_message_from;
use super::mac::{self, MacKey};
use crate::config::MoneticoConfig;
use crate::errors::{AppError, Result};
use crate::models::{Order, OrderStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedForm {
  pub action: String,
  pub fields: BTreeMap<String, String>,
}

/// Builds and signs the form for `order`, which must be pending and carry a
/// Monetico reference.
pub fn build_payment_form(
  config: &MoneticoConfig,
  key: &MacKey,
  order: &Order,
  site_url: &str,
  now: DateTime<Utc>,
) -> Result<SignedForm> {
  if order.status != OrderStatus::Pending {
    return Err(AppError::Validation(format!(
      "Order {} is not awaiting payment",
      order.reference
    )));
  }
  let reference = order
    .monetico_reference
    .clone()
    .ok_or_else(|| AppError::Validation(format!("Order {} has no Monetico reference", order.reference)))?;

  let mut fields = BTreeMap::new();
  fields.insert("TPE".to_string(), config.tpe.clone());
  fields.insert("date".to_string(), now.format("%d/%m/%Y:%H:%M:%S").to_string());
  fields.insert("montant".to_string(), format!("{:.2}EUR", order.total));
  fields.insert("reference".to_string(), reference.clone());
  fields.insert("texte-libre".to_string(), order.reference.clone());
  fields.insert("version".to_string(), config.version.clone());
  fields.insert("lgue".to_string(), config.lang.clone());
  fields.insert("societe".to_string(), config.societe.clone());
  fields.insert("mail".to_string(), order.customer_email.clone().unwrap_or_default());

  let message = mac_message_from(|name| fields.get(name).map(String::as_str));
  let signature = mac::compute(key, &message);

  fields.insert(
    "url_retour_ok".to_string(),
    format!("{}/payment/success?reference={}", site_url, reference),
  );
  fields.insert(
    "url_retour_err".to_string(),
    format!("{}/payment/error?reference={}", site_url, reference),
  );
  fields.insert("MAC".to_string(), signature);

  Ok(SignedForm {
    action: config.payment_url.clone(),
    fields,
  })
}
