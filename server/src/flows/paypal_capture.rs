// caisse/src/flows/paypal_capture.rs

//! Records a PayPal capture in the ledger, then creates and links its order.
//! A crash anywhere after capture leaves a captured, unlinked intent that the
//! orphan listing picks up.

use crate::errors::AppError;
use crate::flows::contexts::PaypalCaptureCtx;
use crate::models::Provider;
use crate::orders;
use caisse_flow::{ContextData, Flow, FlowRegistry, FlowResult, SkipCondition, StepControl};
use std::sync::Arc;
use tracing::{error, info, warn};

const PAYPAL_COMPLETED: &str = "COMPLETED";

pub fn register_paypal_capture_flow(registry: &FlowRegistry<AppError>) -> FlowResult<()> {
  let mut flow = Flow::<PaypalCaptureCtx, AppError>::new(
    "paypal_capture",
    &[
      ("record_attempt", false, None),
      ("apply_capture_status", false, None),
      ("reuse_linked_order", false, None),
      ("adopt_existing_order", false, None),
      ("create_order", false, None),
      ("link_order", false, None),
    ],
  );

  flow.on_step("record_attempt", record_attempt)?;
  flow.on_step("apply_capture_status", apply_capture_status)?;
  flow.on_step("reuse_linked_order", reuse_linked_order)?;
  flow.on_step("adopt_existing_order", adopt_existing_order)?;
  flow.on_step("create_order", create_order)?;
  let order_known: SkipCondition<PaypalCaptureCtx> =
    Arc::new(|ctx: &ContextData<PaypalCaptureCtx>| ctx.read().order_id.is_some());
  flow.set_skip_condition("create_order", Some(order_known))?;
  flow.on_step("link_order", link_order)?;

  registry.register(flow);
  info!("PayPal capture flow registered.");
  Ok(())
}

async fn record_attempt(ctx: ContextData<PaypalCaptureCtx>) -> Result<StepControl, AppError> {
  let (ledger, provider_order_id, payload) =
    ctx.with(|c| (c.app_state.ledger.clone(), c.provider_order_id.clone(), c.payload.clone()));
  let intent = ledger.record_attempt(Provider::Paypal, &provider_order_id, &payload).await?;
  ctx.write().intent = Some(intent);
  Ok(StepControl::Continue)
}

async fn apply_capture_status(ctx: ContextData<PaypalCaptureCtx>) -> Result<StepControl, AppError> {
  let (ledger, provider_order_id, status) =
    ctx.with(|c| (c.app_state.ledger.clone(), c.provider_order_id.clone(), c.capture_status.clone()));

  if status.eq_ignore_ascii_case(PAYPAL_COMPLETED) {
    ledger.mark_captured(Provider::Paypal, &provider_order_id).await?;
    return Ok(StepControl::Continue);
  }

  warn!(%provider_order_id, capture_status = %status, "PayPal capture not completed.");
  ledger
    .mark_failed(Provider::Paypal, &provider_order_id, &format!("PayPal capture status {}", status))
    .await?;
  ctx.write().message = Some(format!("Payment not completed (status {})", status));
  Ok(StepControl::Stop)
}

async fn reuse_linked_order(ctx: ContextData<PaypalCaptureCtx>) -> Result<StepControl, AppError> {
  let (ledger, orders_store, provider_order_id) =
    ctx.with(|c| (c.app_state.ledger.clone(), c.app_state.orders.clone(), c.provider_order_id.clone()));

  let linked = ledger
    .find(Provider::Paypal, &provider_order_id)
    .await?
    .and_then(|i| i.order_id);
  let Some(order_id) = linked else {
    return Ok(StepControl::Continue);
  };

  let reference = orders_store.find_order(order_id).await?.map(|o| o.reference);
  info!(%order_id, "Capture already has an order; returning it.");
  ctx.update(|c| {
    c.order_id = Some(order_id);
    c.reference = reference;
    c.message = Some("Order already recorded for this payment".to_string());
  });
  Ok(StepControl::Stop)
}

/// A retry after a crash between insert and link finds the order already
/// there; link it rather than failing the capture on the unique reference.
async fn adopt_existing_order(ctx: ContextData<PaypalCaptureCtx>) -> Result<StepControl, AppError> {
  let (orders_store, reference) = ctx.with(|c| (c.app_state.orders.clone(), c.payload.reference.clone()));
  if let Some(existing) = orders_store.find_order_by_reference(&reference).await? {
    info!(order_id = %existing.id, %reference, "Order already exists for this capture, adopting it.");
    ctx.update(|c| {
      c.order_id = Some(existing.id);
      c.reference = Some(existing.reference);
      c.message = Some("Existing order linked to payment".to_string());
    });
  }
  Ok(StepControl::Continue)
}

async fn create_order(ctx: ContextData<PaypalCaptureCtx>) -> Result<StepControl, AppError> {
  let (app_state, provider_order_id, payload) =
    ctx.with(|c| (c.app_state.clone(), c.provider_order_id.clone(), c.payload.clone()));

  match orders::create_order(&app_state, payload).await {
    Ok(order) => {
      ctx.update(|c| {
        c.order_id = Some(order.id);
        c.reference = Some(order.reference);
      });
      Ok(StepControl::Continue)
    }
    Err(e) => {
      if let Err(ledger_err) = app_state
        .ledger
        .mark_failed(Provider::Paypal, &provider_order_id, &e.public_message())
        .await
      {
        error!(error = %ledger_err, "Could not record order creation failure on intent.");
      }
      Err(e)
    }
  }
}

async fn link_order(ctx: ContextData<PaypalCaptureCtx>) -> Result<StepControl, AppError> {
  let (ledger, provider_order_id, order_id) =
    ctx.with(|c| (c.app_state.ledger.clone(), c.provider_order_id.clone(), c.order_id));
  let order_id = order_id.ok_or_else(|| AppError::Internal("No order to link".to_string()))?;
  ledger.link_order(Provider::Paypal, &provider_order_id, order_id).await?;
  Ok(StepControl::Continue)
}
