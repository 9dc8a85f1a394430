// caisse/src/services/mod.rs

//! Clients for the external collaborators: shipping drafts, customer
//! notifications, session verification.

pub mod notifier;
pub mod session;
pub mod shipping;

pub use notifier::{HttpNotifier, Notifier};
pub use session::{HttpSessionVerifier, SessionUser, SessionVerifier};
pub use shipping::{DraftSink, HttpDraftSink, LogOnlySink, RetryPolicy, ShippingDraft, ShippingDraftQueue};
