// caisse/src/reconcile.rs

//! Orphan reconciliation: what needs an operator's attention, and the replay
//! that fixes it.

use crate::errors::{AppError, Result};
use crate::flows::contexts::ReplayCtx;
use crate::ledger::PaymentLedger;
use crate::models::{IntentStatus, PaymentIntent};
use crate::state::AppState;
use caisse_flow::ContextData;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, instrument};
use uuid::Uuid;

/// Captured-but-unlinked intents plus failed intents, newest first, without
/// duplicates. Each class is bounded by `page_size` on its own.
#[instrument(name = "reconcile::list_orphans", skip(ledger))]
pub async fn list_orphans(ledger: &PaymentLedger, page_size: i64) -> Result<Vec<PaymentIntent>> {
  let store = ledger.store();
  let captured = store.list_intents(IntentStatus::Captured, true, page_size).await?;
  let failed = store.list_intents(IntentStatus::Failed, false, page_size).await?;

  let mut seen = HashSet::new();
  let mut merged: Vec<PaymentIntent> = captured
    .into_iter()
    .chain(failed)
    .filter(|intent| seen.insert(intent.id))
    .collect();
  merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));

  info!(count = merged.len(), "Orphan intents listed.");
  Ok(merged)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayOutcome {
  pub order_id: Option<Uuid>,
  pub reference: Option<String>,
  pub message: Option<String>,
}

/// Re-runs order creation for an intent. Linked intents succeed without
/// creating anything; failures leave the intent as it was.
#[instrument(name = "reconcile::replay_intent", skip(app_state))]
pub async fn replay_intent(app_state: &AppState, intent_id: Uuid) -> Result<ReplayOutcome> {
  let ctx = ContextData::new(ReplayCtx {
    app_state: app_state.clone(),
    intent_id,
    intent: None,
    order_id: None,
    reference: None,
    message: None,
  });

  app_state.flows.run(ctx.clone()).await?;

  let outcome = ctx.with(|c| ReplayOutcome {
    order_id: c.order_id,
    reference: c.reference.clone(),
    message: c.message.clone(),
  });
  if outcome.order_id.is_none() {
    return Err(AppError::Internal("Replay finished without an order".to_string()));
  }
  Ok(outcome)
}
