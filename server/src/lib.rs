// caisse/src/lib.rs

//! Payment confirmation and reconciliation service.
//!
//! Monetico returns are MAC-verified before anything is read or written;
//! every provider payment is recorded as an intent so that captures without
//! an order can be listed and replayed.

pub mod config;
pub mod errors;
pub mod flows;
pub mod ledger;
pub mod models;
pub mod monetico;
pub mod orders;
pub mod reconcile;
pub mod services;
pub mod state;
pub mod store;
pub mod web;
