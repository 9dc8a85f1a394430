// caisse/src/flows/replay.rs

//! Manual recovery of an orphan intent: rebuild the order from the stored
//! payload and link it. The intent is only written by the final link.

use crate::errors::AppError;
use crate::flows::contexts::ReplayCtx;
use crate::orders;
use caisse_flow::{ContextData, Flow, FlowRegistry, FlowResult, SkipCondition, StepControl};
use std::sync::Arc;
use tracing::info;

pub fn register_replay_flow(registry: &FlowRegistry<AppError>) -> FlowResult<()> {
  let order_known: SkipCondition<ReplayCtx> = Arc::new(|ctx: &ContextData<ReplayCtx>| ctx.read().order_id.is_some());

  let mut flow = Flow::<ReplayCtx, AppError>::new(
    "replay_intent",
    &[
      ("load_intent", false, None),
      ("short_circuit_if_linked", false, None),
      ("require_orphan", false, None),
      ("adopt_existing_order", false, None),
      ("create_order_from_payload", false, Some(order_known)),
      ("link_order", false, None),
    ],
  );

  flow.on_step("load_intent", |ctx: ContextData<ReplayCtx>| async move {
    let (ledger, intent_id) = ctx.with(|c| (c.app_state.ledger.clone(), c.intent_id));
    let intent = ledger
      .get(intent_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Payment intent {} not found", intent_id)))?;
    ctx.write().intent = Some(intent);
    Ok::<_, AppError>(StepControl::Continue)
  })?;

  flow.on_step("short_circuit_if_linked", |ctx: ContextData<ReplayCtx>| async move {
    let (store, linked) = ctx.with(|c| {
      (
        c.app_state.orders.clone(),
        c.intent.as_ref().and_then(|i| i.order_id),
      )
    });
    let Some(order_id) = linked else {
      return Ok::<_, AppError>(StepControl::Continue);
    };
    let reference = store.find_order(order_id).await?.map(|o| o.reference);
    info!(%order_id, "Intent already linked, replay is a no-op.");
    ctx.update(|c| {
      c.order_id = Some(order_id);
      c.reference = reference;
      c.message = Some("Intent already linked to an order".to_string());
    });
    Ok::<_, AppError>(StepControl::Stop)
  })?;

  // Only money the provider confirmed (or a failed attempt) may be turned
  // into an order; a pending attempt is left for its own flow.
  flow.on_step("require_orphan", |ctx: ContextData<ReplayCtx>| async move {
    let intent = ctx.with(|c| c.intent.clone());
    match intent {
      Some(intent) if intent.is_orphan() => Ok(StepControl::Continue),
      Some(intent) => Err(AppError::Validation(format!(
        "Payment intent {} is {:?} and cannot be replayed",
        intent.id, intent.status
      ))),
      None => Err(AppError::Internal("Intent not loaded".to_string())),
    }
  })?;

  // A crash between order insert and link leaves the order behind; reuse it
  // instead of inserting a duplicate.
  flow.on_step("adopt_existing_order", |ctx: ContextData<ReplayCtx>| async move {
    let (store, reference) = ctx.with(|c| {
      (
        c.app_state.orders.clone(),
        c.intent.as_ref().map(|i| i.payload.reference.clone()).unwrap_or_default(),
      )
    });
    if let Some(existing) = store.find_order_by_reference(&reference).await? {
      info!(order_id = %existing.id, reference = %existing.reference, "Order already exists for payload, adopting it.");
      ctx.update(|c| {
        c.order_id = Some(existing.id);
        c.reference = Some(existing.reference);
        c.message = Some("Existing order linked to intent".to_string());
      });
    }
    Ok::<_, AppError>(StepControl::Continue)
  })?;

  flow.on_step("create_order_from_payload", |ctx: ContextData<ReplayCtx>| async move {
    let (app_state, payload) = ctx.with(|c| (c.app_state.clone(), c.intent.as_ref().map(|i| i.payload.clone())));
    let payload = payload.ok_or_else(|| AppError::Internal("Intent not loaded".to_string()))?;
    let order = orders::create_order(&app_state, payload).await?;
    ctx.update(|c| {
      c.order_id = Some(order.id);
      c.reference = Some(order.reference);
      c.message = Some("Order created from payment intent".to_string());
    });
    Ok::<_, AppError>(StepControl::Continue)
  })?;

  flow.on_step("link_order", |ctx: ContextData<ReplayCtx>| async move {
    let (ledger, intent, order_id) = ctx.with(|c| (c.app_state.ledger.clone(), c.intent.clone(), c.order_id));
    let (Some(intent), Some(order_id)) = (intent, order_id) else {
      return Err(AppError::Internal("Replay reached link without intent or order".to_string()));
    };
    ledger.link_order(intent.provider, &intent.provider_order_id, order_id).await?;
    Ok::<_, AppError>(StepControl::Continue)
  })?;

  registry.register(flow);
  info!("Intent replay flow registered.");
  Ok(())
}
