//! Session-cookie JSON-RPC client for the Odoo record store.
//!
//! Sessions are short-lived by design: [`OdooClient::login`] is called at
//! the start of each lifecycle operation and the resulting [`OdooSession`]
//! is dropped when the operation finishes, so no credential survives a
//! serverless warm start.

mod client;
mod config;
mod records;

pub use client::{OdooClient, OdooSession};
pub use config::OdooConfig;
