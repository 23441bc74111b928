//! Transactional email over the Resend HTTP API.

mod client;
mod config;

pub use client::ResendClient;
pub use config::MailerConfig;
