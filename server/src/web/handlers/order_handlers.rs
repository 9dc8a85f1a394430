// caisse/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::models::OrderInput;
use crate::orders;
use crate::state::AppState;
use crate::web::auth::InternalCaller;

/// Always answers with an `ok` body; failures carry their kind and the
/// matching status code.
#[instrument(
  name = "handler::create_order",
  skip(app_state, _caller, payload),
  fields(reference = %payload.reference, items = payload.items.len())
)]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  _caller: InternalCaller,
  payload: web::Json<OrderInput>,
) -> HttpResponse {
  match orders::create_order(app_state.get_ref(), payload.into_inner()).await {
    Ok(order) => {
      info!(order_id = %order.id, "Order created.");
      HttpResponse::Created().json(json!({ "ok": true, "order": order }))
    }
    Err(e) => {
      warn!(error = %e, kind = ?e.kind(), "Order creation failed.");
      HttpResponse::build(e.status_code()).json(e.failure_body())
    }
  }
}
