// tests/common/mod.rs
#![allow(dead_code)]

use caisse_flow::{ContextData, FlowError, Handler, StepControl};
use once_cell::sync::Lazy;
use tracing::Level;

/// Stand-in for a payment-confirmation context.
#[derive(Clone, Debug, Default)]
pub struct ReceiptCtx {
  pub reference: String,
  pub steps_executed: Vec<String>,
  pub stop_at: Option<String>,
  pub completed: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RefundCtx {
  pub amount_cents: i64,
  pub refunded: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("flow engine error: {0}")]
  Flow(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(e: FlowError) -> Self {
    TestError::Flow(format!("{:?}", e))
  }
}

/// Records its step name and stops when `stop_at` names it.
pub fn recording_handler(step_name: &'static str) -> Handler<ReceiptCtx, TestError> {
  Box::new(move |ctx: ContextData<ReceiptCtx>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.steps_executed.push(step_name.to_string());
      if guard.stop_at.as_deref() == Some(step_name) {
        return Ok(StepControl::Stop);
      }
      Ok(StepControl::Continue)
    })
  })
}

pub fn failing_handler(step_name: &'static str, message: &'static str) -> Handler<ReceiptCtx, TestError> {
  Box::new(move |ctx: ContextData<ReceiptCtx>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      Err(TestError::Handler(message.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
