// caisse/src/web/handlers/admin_handlers.rs

use actix_web::{web, HttpResponse, ResponseError};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::reconcile;
use crate::state::AppState;
use crate::web::auth::AdminCaller;

#[instrument(name = "handler::list_orphans", skip(app_state, caller))]
pub async fn list_orphans_handler(
  app_state: web::Data<AppState>,
  caller: AdminCaller,
) -> Result<HttpResponse, AppError> {
  let intents = reconcile::list_orphans(&app_state.ledger, app_state.config.orphan_page_size).await?;
  info!(?caller, count = intents.len(), "Orphan intents served.");
  Ok(HttpResponse::Ok().json(json!({ "intents": intents })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRequest {
  pub intent_id: String,
}

#[instrument(name = "handler::replay_intent", skip(app_state, caller, payload), fields(intent_id = %payload.intent_id))]
pub async fn replay_intent_handler(
  app_state: web::Data<AppState>,
  caller: AdminCaller,
  payload: web::Json<ReplayRequest>,
) -> HttpResponse {
  let result = match Uuid::parse_str(payload.intent_id.trim()) {
    Ok(intent_id) => reconcile::replay_intent(app_state.get_ref(), intent_id).await,
    Err(_) => Err(AppError::Validation(format!("Invalid intent id: {}", payload.intent_id))),
  };

  match result {
    Ok(outcome) => {
      info!(?caller, order_id = ?outcome.order_id, "Intent replayed.");
      HttpResponse::Ok().json(json!({
        "ok": true,
        "orderId": outcome.order_id,
        "reference": outcome.reference,
        "message": outcome.message,
      }))
    }
    Err(e) => {
      warn!(error = %e, kind = ?e.kind(), "Intent replay failed.");
      HttpResponse::build(e.status_code()).json(e.failure_body())
    }
  }
}
