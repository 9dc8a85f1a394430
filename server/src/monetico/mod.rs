// caisse/src/monetico/mod.rs

//! Monetico v3.0 protocol pieces: MAC engine, field contract, form signer.

pub mod fields;
pub mod form;
pub mod mac;

pub use fields::MoneticoFields;
pub use mac::MacKey;
