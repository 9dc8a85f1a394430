// caisse/src/flows/mod.rs

//! Flow definitions for every multi-step operation, registered once at
//! startup.

use crate::errors::AppError;
use caisse_flow::{FlowRegistry, FlowResult};

pub mod contexts;
pub mod create_order;
pub mod monetico_return;
pub mod paypal_capture;
pub mod replay;

pub fn register_all_flows(registry: &FlowRegistry<AppError>) -> FlowResult<()> {
  tracing::info!("Registering flows...");

  monetico_return::register_monetico_return_flow(registry)?;
  create_order::register_create_order_flow(registry)?;
  replay::register_replay_flow(registry)?;
  paypal_capture::register_paypal_capture_flow(registry)?;

  tracing::info!("All flows registered.");
  Ok(())
}
