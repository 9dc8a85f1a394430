// caisse/src/web/handlers/paypal_handlers.rs

use actix_web::{web, HttpResponse, ResponseError};
use caisse_flow::ContextData;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::flows::contexts::PaypalCaptureCtx;
use crate::models::OrderInput;
use crate::state::AppState;
use crate::web::auth::InternalCaller;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
  pub provider_order_id: String,
  pub status: String,
  pub order: OrderInput,
}

#[instrument(
  name = "handler::paypal_capture",
  skip(app_state, _caller, payload),
  fields(provider_order_id = %payload.provider_order_id, status = %payload.status)
)]
pub async fn record_capture_handler(
  app_state: web::Data<AppState>,
  _caller: InternalCaller,
  payload: web::Json<CaptureRequest>,
) -> HttpResponse {
  let CaptureRequest {
    provider_order_id,
    status,
    order,
  } = payload.into_inner();

  let ctx = ContextData::new(PaypalCaptureCtx {
    app_state: app_state.get_ref().clone(),
    provider_order_id,
    capture_status: status,
    payload: order,
    intent: None,
    order_id: None,
    reference: None,
    message: None,
  });

  if let Err(e) = app_state.flows.run(ctx.clone()).await {
    warn!(error = %e, kind = ?e.kind(), "PayPal capture could not be recorded.");
    return HttpResponse::build(e.status_code()).json(e.failure_body());
  }

  let (order_id, reference, message) = ctx.with(|c| (c.order_id, c.reference.clone(), c.message.clone()));
  match order_id {
    Some(order_id) => {
      info!(%order_id, "PayPal capture linked to order.");
      HttpResponse::Ok().json(json!({
        "ok": true,
        "orderId": order_id,
        "reference": reference,
        "message": message,
      }))
    }
    None => {
      let refused = AppError::Validation(message.unwrap_or_else(|| "Payment not completed".to_string()));
      HttpResponse::build(refused.status_code()).json(refused.failure_body())
    }
  }
}
