// caisse/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod monetico_handlers;
pub mod order_handlers;
pub mod paypal_handlers;
