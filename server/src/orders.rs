// caisse/src/orders.rs

//! Order creation rules shared by the checkout entry point, PayPal capture
//! recording and orphan replay.

use crate::errors::{AppError, Result};
use crate::flows::contexts::CreateOrderCtx;
use crate::models::{DeliveryType, Order, OrderInput, OrderItemInput, OrderLineItem, OrderStatus};
use crate::state::AppState;
use caisse_flow::{ContextData, FlowOutcome};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Delivery and shape checks. Nothing is persisted when this fails.
pub fn validate_input(input: &OrderInput) -> Result<()> {
  if input.reference.trim().is_empty() {
    return Err(AppError::Validation("Order reference is required".to_string()));
  }
  if input.items.is_empty() {
    return Err(AppError::Validation("An order needs at least one item".to_string()));
  }
  if let Some(item) = input.items.iter().find(|i| i.quantity <= 0) {
    return Err(AppError::Validation(format!(
      "Invalid quantity {} for product {}",
      item.quantity, item.product_id
    )));
  }
  if input.total < Decimal::ZERO {
    return Err(AppError::Validation("Order total cannot be negative".to_string()));
  }

  if input.delivery_type == DeliveryType::Relay {
    let Some(point) = &input.pickup_point else {
      return Err(AppError::Validation(
        "Relay delivery requires a pickup point".to_string(),
      ));
    };
    let blank = point.blank_fields();
    if !blank.is_empty() {
      return Err(AppError::Validation(format!(
        "Pickup point is incomplete: missing {}",
        blank.join(", ")
      )));
    }
  }
  Ok(())
}

/// Turns submitted items into persisted line items, freezing descriptive
/// attributes as they are now.
pub fn normalize_items(items: &[OrderItemInput], now: DateTime<Utc>) -> Vec<OrderLineItem> {
  items
    .iter()
    .map(|item| {
      let mut attributes = item.attributes.clone();
      for (name, value) in [("flavor", &item.flavor), ("size", &item.size), ("color", &item.color)] {
        if let Some(value) = value.as_ref().filter(|v| !v.trim().is_empty()) {
          attributes.insert(name.to_string(), value.clone());
        }
      }
      OrderLineItem {
        id: Uuid::new_v4(),
        product_id: item.product_id.clone(),
        variant_id: item.variant_id.clone(),
        quantity: item.quantity,
        unit_price: item.unit_price,
        name: item.name.clone(),
        image: item.image.clone(),
        attributes,
        created_at: now,
      }
    })
    .collect()
}

/// A new `pending` order from validated input and normalized items.
pub fn build_order(input: &OrderInput, items: Vec<OrderLineItem>, now: DateTime<Utc>) -> Order {
  Order {
    id: Uuid::new_v4(),
    reference: input.reference.trim().to_string(),
    total: input.total,
    status: OrderStatus::Pending,
    payment_method: input.payment_method.clone(),
    items,
    delivery_type: input.delivery_type,
    pickup_point: match input.delivery_type {
      DeliveryType::Relay => input.pickup_point.clone(),
      DeliveryType::Home => None,
    },
    monetico_reference: input.monetico_reference.clone().filter(|r| !r.trim().is_empty()),
    shipping_cost: input.shipping_cost.unwrap_or(Decimal::ZERO),
    comment: input.comment.clone(),
    customer_email: input.customer_email.clone(),
    user_id: input.user_id.clone(),
    provider_transaction_id: None,
    created_at: now,
    updated_at: now,
  }
}

/// Runs the order-creation flow. Every failure, including engine errors,
/// comes back as `Err` with a typed kind; nothing panics past this point.
#[instrument(name = "orders::create_order", skip_all, fields(reference = %input.reference))]
pub async fn create_order(app_state: &AppState, input: OrderInput) -> Result<Order> {
  let ctx = ContextData::new(CreateOrderCtx {
    app_state: app_state.clone(),
    input,
    items: Vec::new(),
    order: None,
  });

  let outcome = app_state.flows.run(ctx.clone()).await?;
  let order = ctx.read().order.clone();
  match outcome {
    FlowOutcome::Completed => {
      order.ok_or_else(|| AppError::Internal("Order flow completed without an order".to_string()))
    }
    FlowOutcome::Stopped => {
      warn!("Order creation flow stopped before persisting.");
      Err(AppError::Internal("Order creation was halted".to_string()))
    }
  }
}
