//! Finam TradeAPI adapter.
//!
//! `client` speaks http, `args` holds the typed request arguments the broker
//! tools accept, and `error` the single error schema every failure maps to.

pub mod args;
pub mod client;
pub mod error;

pub use client::FinamClient;
pub use error::BrokerError;
