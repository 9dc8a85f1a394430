// caisse/src/web/handlers/monetico_handlers.rs

use actix_web::http::header;
use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use caisse_flow::{ContextData, FlowOutcome};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument};

use crate::errors::{AppError, ErrorKind};
use crate::flows::contexts::{MoneticoReturnCtx, ReturnTransport};
use crate::monetico::form::{build_payment_form, SignedForm};
use crate::monetico::{MacKey, MoneticoFields};
use crate::state::AppState;
use crate::web::auth::InternalCaller;

/// Form-encoded POSTs are bank notifications; anything else is a browser
/// coming back with the fields in its query string.
fn transport_of(req: &HttpRequest) -> ReturnTransport {
  let is_form = req
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/x-www-form-urlencoded"))
    .unwrap_or(false);
  if req.method() == Method::POST && is_form {
    ReturnTransport::Notification
  } else {
    ReturnTransport::Redirect
  }
}

/// Unparseable input yields no fields, which the flow reports as missing.
fn parse_fields(transport: ReturnTransport, req: &HttpRequest, body: &[u8]) -> MoneticoFields {
  let pairs: Vec<(String, String)> = match transport {
    ReturnTransport::Notification => serde_urlencoded::from_bytes(body),
    ReturnTransport::Redirect => serde_urlencoded::from_str(req.query_string()),
  }
  .unwrap_or_default();
  MoneticoFields::from_pairs(pairs)
}

fn return_page(site_url: &str, success: bool, reference: &str, code_retour: &str) -> String {
  let page = if success { "success" } else { "error" };
  let query = serde_urlencoded::to_string(&[("reference", reference), ("code-retour", code_retour)][..]).unwrap_or_default();
  format!("{}/payment/{}?{}", site_url.trim_end_matches('/'), page, query)
}

fn respond(transport: ReturnTransport, site_url: &str, success: bool, reference: &str, code_retour: &str) -> HttpResponse {
  match transport {
    ReturnTransport::Notification => HttpResponse::Ok().json(json!({ "success": success, "reference": reference })),
    ReturnTransport::Redirect => HttpResponse::Found()
      .insert_header((header::LOCATION, return_page(site_url, success, reference, code_retour)))
      .finish(),
  }
}

#[instrument(name = "handler::monetico_return", skip_all, fields(method = %req.method()))]
pub async fn monetico_return_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let transport = transport_of(&req);
  let fields = parse_fields(transport, &req, &body);
  let reference = fields.reference().to_string();
  let code_retour = fields.return_code().to_string();
  info!(?transport, %reference, %code_retour, "Monetico return received.");

  let ctx = ContextData::new(MoneticoReturnCtx {
    app_state: app_state.get_ref().clone(),
    fields,
    transport,
    key: None,
    is_success: false,
    matched_order: false,
    completed_order: None,
    customer_notified: false,
  });

  let site_url = app_state.config.site_url.clone();
  match app_state.flows.run(ctx.clone()).await {
    Ok(outcome) => {
      let (is_success, matched_order, customer_notified) =
        ctx.with(|c| (c.is_success, c.matched_order, c.customer_notified));
      let success = is_success && outcome == FlowOutcome::Completed;
      info!(%reference, success, matched_order, customer_notified, "Monetico return handled.");
      Ok(respond(transport, &site_url, success, &reference, &code_retour))
    }
    Err(e) => match e.kind() {
      ErrorKind::MissingFields | ErrorKind::SignatureInvalid | ErrorKind::Configuration => Err(e),
      _ => {
        error!(error = %e, %reference, "Monetico return could not be applied.");
        match transport {
          ReturnTransport::Notification => Ok(
            HttpResponse::InternalServerError().json(json!({ "success": false, "reference": reference })),
          ),
          ReturnTransport::Redirect => Ok(respond(transport, &site_url, false, &reference, &code_retour)),
        }
      }
    },
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFormRequest {
  pub reference: String,
}

#[instrument(name = "handler::monetico_form", skip(app_state, _caller, payload), fields(reference = %payload.reference))]
pub async fn payment_form_handler(
  app_state: web::Data<AppState>,
  _caller: InternalCaller,
  payload: web::Json<PaymentFormRequest>,
) -> Result<HttpResponse, AppError> {
  let raw_key = app_state
    .config
    .monetico
    .key
    .clone()
    .ok_or_else(|| AppError::Config("MONETICO_KEY is not configured".to_string()))?;
  let key = MacKey::from_hex(&raw_key)?;

  let order = app_state
    .orders
    .find_order_by_reference(&payload.reference)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", payload.reference)))?;

  let form: SignedForm = build_payment_form(&app_state.config.monetico, &key, &order, &app_state.config.site_url, Utc::now())?;
  info!(order_id = %order.id, "Monetico payment form signed.");
  Ok(HttpResponse::Ok().json(form))
}
