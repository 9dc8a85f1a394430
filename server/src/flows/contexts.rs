// caisse/src/flows/contexts.rs

//! Data carried through each flow run. Handlers receive these wrapped in
//! `caisse_flow::ContextData`.

use crate::models::{Order, OrderInput, OrderLineItem, PaymentIntent};
use crate::monetico::{MacKey, MoneticoFields};
use crate::state::AppState;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnTransport {
  /// Server-to-server form POST; answered with a JSON body.
  Notification,
  /// Browser return; answered with a redirect.
  Redirect,
}

#[derive(Clone)]
pub struct MoneticoReturnCtx {
  pub app_state: AppState,
  pub fields: MoneticoFields,
  pub transport: ReturnTransport,
  pub key: Option<MacKey>,
  pub is_success: bool,
  pub matched_order: bool,
  /// Set only when this delivery moved the order to `completed`.
  pub completed_order: Option<Order>,
  pub customer_notified: bool,
}

#[derive(Clone)]
pub struct CreateOrderCtx {
  pub app_state: AppState,
  pub input: OrderInput,
  pub items: Vec<OrderLineItem>,
  pub order: Option<Order>,
}

#[derive(Clone)]
pub struct ReplayCtx {
  pub app_state: AppState,
  pub intent_id: Uuid,
  pub intent: Option<PaymentIntent>,
  pub order_id: Option<Uuid>,
  pub reference: Option<String>,
  pub message: Option<String>,
}

#[derive(Clone)]
pub struct PaypalCaptureCtx {
  pub app_state: AppState,
  pub provider_order_id: String,
  pub capture_status: String,
  pub payload: OrderInput,
  pub intent: Option<PaymentIntent>,
  pub order_id: Option<Uuid>,
  pub reference: Option<String>,
  pub message: Option<String>,
}
