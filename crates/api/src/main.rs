//! Voltra order platform HTTP API.
//!
//! Wires the production adapters (Odoo JSON-RPC, Firestore/Cloud Storage,
//! Resend) into the lifecycle orchestrator and exposes it over axum.

mod error;
mod handlers;
mod pages;
mod signature;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use secrecy::SecretString;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use handlers::AppState;
use lifecycle::{Lifecycle, LifecycleConfig};
use mailer::ResendClient;
use odoo_rpc::OdooClient;
use order_store::Firebase;

fn init_or_exit<T, E: std::fmt::Display>(result: Result<T, E>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, "failed to initialize {}", what);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let records = init_or_exit(OdooClient::from_env(), "Odoo client");
    let firebase = init_or_exit(Firebase::from_env(), "Firebase credentials");
    let orders = firebase.firestore();
    let blobs = init_or_exit(firebase.storage(), "Cloud Storage client");
    let mailer = init_or_exit(ResendClient::from_env(), "Resend client");
    let config = init_or_exit(LifecycleConfig::from_env(), "lifecycle configuration");

    let webhook_secret = init_or_exit(
        env::var("STRIPE_WEBHOOK_SECRET").map(SecretString::from),
        "STRIPE_WEBHOOK_SECRET",
    );
    let cron_secret = init_or_exit(env::var("CRON_SECRET"), "CRON_SECRET");

    let state = AppState {
        lifecycle: Arc::new(Lifecycle::new(records, orders, blobs, mailer, config)),
        webhook_secret: Arc::new(webhook_secret),
        cron_secret: Arc::new(cron_secret),
    };

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/intake", post(handlers::intake))
        .route("/api/stripe/webhook", post(handlers::stripe_webhook))
        .route("/scan", get(handlers::scan))
        .route("/api/telemetry", post(handlers::telemetry))
        .route(
            "/api/reconcile",
            get(handlers::reconcile).post(handlers::reconcile),
        )
        .route("/api/quote", get(handlers::quote_pdf))
        .route("/api/quote/archive", post(handlers::archive_quote))
        .with_state(state);

    let addr = env::var("VOLTRA_API_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = init_or_exit(addr.parse(), "listen address");
    info!(%addr, "API listening");

    let listener = init_or_exit(tokio::net::TcpListener::bind(addr).await, "listener");
    init_or_exit(axum::serve(listener, app).await, "server");
}
