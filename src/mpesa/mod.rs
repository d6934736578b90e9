//! Daraja (M-Pesa) gateway adapter
//!
//! OAuth token handling, STK push initiation, STK status queries, and the
//! typed callback payload the gateway delivers asynchronously.

pub mod client;
pub mod error;
pub mod types;
pub mod utils;

pub use client::{DarajaClient, DarajaConfig, StkAcknowledgement, StkPushArgs};
pub use error::{GatewayError, GatewayResult};
