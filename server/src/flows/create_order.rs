// caisse/src/flows/create_order.rs

use crate::errors::AppError;
use crate::flows::contexts::CreateOrderCtx;
use crate::orders;
use crate::services::ShippingDraft;
use caisse_flow::{ContextData, Flow, FlowRegistry, FlowResult, StepControl};
use chrono::Utc;
use tracing::{info, warn};

pub fn register_create_order_flow(registry: &FlowRegistry<AppError>) -> FlowResult<()> {
  let mut flow = Flow::<CreateOrderCtx, AppError>::new(
    "create_order",
    &[
      ("validate_delivery", false, None),
      ("normalize_items", false, None),
      ("persist_order", false, None),
      ("queue_shipping_draft", true, None),
    ],
  );

  flow.on_step("validate_delivery", |ctx: ContextData<CreateOrderCtx>| async move {
    ctx.with(|c| orders::validate_input(&c.input))?;
    Ok::<_, AppError>(StepControl::Continue)
  })?;

  flow.on_step("normalize_items", |ctx: ContextData<CreateOrderCtx>| async move {
    ctx.update(|c| c.items = orders::normalize_items(&c.input.items, Utc::now()));
    Ok::<_, AppError>(StepControl::Continue)
  })?;

  flow.on_step("persist_order", |ctx: ContextData<CreateOrderCtx>| async move {
    let (store, order) = ctx.update(|c| {
      let items = std::mem::take(&mut c.items);
      (c.app_state.orders.clone(), orders::build_order(&c.input, items, Utc::now()))
    });
    let persisted = store.insert_order(&order).await?;
    info!(order_id = %persisted.id, reference = %persisted.reference, "Order persisted.");
    ctx.write().order = Some(persisted);
    Ok::<_, AppError>(StepControl::Continue)
  })?;

  // Enqueue only; delivery and its retries happen on the shipping worker.
  flow.on_step("queue_shipping_draft", |ctx: ContextData<CreateOrderCtx>| async move {
    let (queue, draft) = ctx.with(|c| (c.app_state.shipping.clone(), c.order.as_ref().map(ShippingDraft::from)));
    if let Some(draft) = draft {
      if let Err(e) = queue.enqueue(draft) {
        warn!(error = %e, "Shipping draft not queued.");
      }
    }
    Ok::<_, AppError>(StepControl::Continue)
  })?;

  registry.register(flow);
  info!("Order creation flow registered.");
  Ok(())
}
