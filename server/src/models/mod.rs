// caisse/src/models/mod.rs

pub mod order;
pub mod payment_intent;

pub use order::{DeliveryType, Order, OrderInput, OrderItemInput, OrderLineItem, OrderStatus, PickupPoint};
pub use payment_intent::{IntentStatus, PaymentIntent, Provider};
