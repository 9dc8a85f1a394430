// caisse/src/flows/monetico_return.rs

//! Verification and application of a Monetico payment return.
//!
//! Nothing touches the store before the MAC has been checked. A failure
//! outcome stops the flow without any mutation; a success moves the matching
//! order from `pending` to `completed` exactly once.

use crate::errors::AppError;
use crate::flows::contexts::MoneticoReturnCtx;
use crate::models::OrderStatus;
use crate::monetico::{mac, MacKey};
use caisse_flow::{ContextData, Flow, FlowRegistry, FlowResult, SkipCondition, StepControl};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ALERT_SUCCESS_WITHOUT_ORDER: &str = "monetico_success_without_order";

pub fn register_monetico_return_flow(registry: &FlowRegistry<AppError>) -> FlowResult<()> {
  let nothing_completed: SkipCondition<MoneticoReturnCtx> =
    Arc::new(|ctx: &ContextData<MoneticoReturnCtx>| ctx.read().completed_order.is_none());

  let mut flow = Flow::<MoneticoReturnCtx, AppError>::new(
    "monetico_return",
    &[
      ("check_required_fields", false, None),
      ("load_mac_key", false, None),
      ("verify_mac", false, None),
      ("classify_outcome", false, None),
      ("apply_outcome", false, None),
      ("notify_customer", true, Some(nothing_completed)),
    ],
  );

  flow.on_step("check_required_fields", check_required_fields)?;
  flow.on_step("load_mac_key", load_mac_key)?;
  flow.on_step("verify_mac", verify_mac)?;
  flow.on_step("classify_outcome", classify_outcome)?;
  flow.on_step("apply_outcome", apply_outcome)?;
  flow.on_step("notify_customer", notify_customer)?;

  registry.register(flow);
  info!("Monetico return flow registered.");
  Ok(())
}

async fn check_required_fields(ctx: ContextData<MoneticoReturnCtx>) -> Result<StepControl, AppError> {
  let missing = ctx.read().fields.missing_required();
  if !missing.is_empty() {
    warn!(missing = ?missing, "Monetico return is missing required fields.");
    return Err(AppError::MissingFields(missing));
  }
  Ok(StepControl::Continue)
}

async fn load_mac_key(ctx: ContextData<MoneticoReturnCtx>) -> Result<StepControl, AppError> {
  let raw_key = ctx.read().app_state.config.monetico.key.clone();
  let Some(raw_key) = raw_key else {
    return Err(AppError::Config("MONETICO_KEY is not configured".to_string()));
  };
  let key = MacKey::from_hex(&raw_key)?;
  ctx.write().key = Some(key);
  Ok(StepControl::Continue)
}

async fn verify_mac(ctx: ContextData<MoneticoReturnCtx>) -> Result<StepControl, AppError> {
  let guard = ctx.read();
  let key = guard
    .key
    .as_ref()
    .ok_or_else(|| AppError::Internal("MAC key not loaded".to_string()))?;
  let message = guard.fields.mac_message();
  let received = guard.fields.get("MAC").unwrap_or_default();

  if !mac::verify(key, &message, received) {
    warn!(
      reference = %guard.fields.reference(),
      received = %mac::redact(received),
      expected = %mac::redact(&mac::compute(key, &message)),
      "Monetico MAC mismatch."
    );
    return Err(AppError::SignatureInvalid);
  }
  debug!(reference = %guard.fields.reference(), "Monetico MAC verified.");
  Ok(StepControl::Continue)
}

async fn classify_outcome(ctx: ContextData<MoneticoReturnCtx>) -> Result<StepControl, AppError> {
  let mut guard = ctx.write();
  guard.is_success = guard.fields.is_success();
  if !guard.is_success {
    info!(
      reference = %guard.fields.reference(),
      code_retour = %guard.fields.return_code(),
      "Monetico reports a failed payment, nothing to apply."
    );
    return Ok(StepControl::Stop);
  }
  Ok(StepControl::Continue)
}

async fn apply_outcome(ctx: ContextData<MoneticoReturnCtx>) -> Result<StepControl, AppError> {
  let (orders, reference, numauto) = ctx.with(|c| {
    (
      c.app_state.orders.clone(),
      c.fields.reference().to_string(),
      c.fields.non_empty("numauto").map(str::to_string),
    )
  });

  let Some(order) = orders.find_order_by_monetico_reference(&reference).await? else {
    warn!(
      alert = ALERT_SUCCESS_WITHOUT_ORDER,
      reference = %reference,
      "Verified Monetico success has no matching order; acknowledging anyway."
    );
    return Ok(StepControl::Continue);
  };
  ctx.write().matched_order = true;

  match order.status {
    OrderStatus::Pending => match orders.complete_if_pending(order.id, numauto.as_deref()).await? {
      Some(completed) => {
        info!(order_id = %completed.id, reference = %reference, "Order completed by Monetico payment.");
        ctx.write().completed_order = Some(completed);
      }
      None => info!(order_id = %order.id, "Order left pending state concurrently; nothing to do."),
    },
    OrderStatus::Completed => {
      info!(order_id = %order.id, "Order already completed; duplicate notification ignored.")
    }
    OrderStatus::Cancelled => {
      warn!(order_id = %order.id, reference = %reference, "Payment received for a cancelled order.")
    }
  }
  Ok(StepControl::Continue)
}

async fn notify_customer(ctx: ContextData<MoneticoReturnCtx>) -> Result<StepControl, AppError> {
  let (notifier, order) = ctx.with(|c| (c.app_state.notifier.clone(), c.completed_order.clone()));
  if let Some(order) = order {
    notifier.payment_confirmed(&order).await?;
    ctx.write().customer_notified = true;
  }
  Ok(StepControl::Continue)
}
