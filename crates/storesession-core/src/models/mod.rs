//! Data models for store API responses.
//!
//! Only the fields the token machinery reads are typed; everything else the
//! backend returns is kept as raw JSON.

pub mod customer;

pub use customer::{Customer, LoginPayload};
