//! HTTP handlers for the platform API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use lifecycle::{ArchiveOutcome, IntakeOutcome, IntakeRequest, Lifecycle, ReconcileSummary};
use mailer::ResendClient;
use odoo_rpc::OdooClient;
use order_core::{TelemetryOutcome, TelemetryRequest};
use order_store::{CloudStorage, FirestoreStore};

use crate::error::ApiError;
use crate::pages;
use crate::signature;

/// The orchestrator bound to its production adapters.
pub type PlatformLifecycle = Lifecycle<OdooClient, FirestoreStore, CloudStorage, ResendClient>;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<PlatformLifecycle>,
    pub webhook_secret: Arc<SecretString>,
    pub cron_secret: Arc<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn intake(
    State(state): State<AppState>,
    Json(request): Json<IntakeRequest>,
) -> Result<Json<IntakeOutcome>, ApiError> {
    let outcome = state.lifecycle.intake(&request).await?;
    Ok(Json(outcome))
}

/// Stripe webhook endpoint.
///
/// The signature is checked before the body is even parsed; once the event
/// is authenticated the endpoint always acknowledges with 200, even when
/// downstream work failed, so Stripe does not retry what reconciliation
/// will finish anyway.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let header = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("webhook without signature header");
            ApiError::BadRequest("missing Stripe-Signature header".to_string())
        })?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    if let Err(e) = signature::verify(
        state.webhook_secret.expose_secret(),
        header,
        &body,
        now,
    ) {
        warn!(error = %e, "webhook signature rejected");
        return Err(ApiError::BadRequest(e.to_string()));
    }

    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON payload: {}", e)))?;
    let event_type = event["type"].as_str().unwrap_or_default();

    if event_type == "payment_intent.succeeded" {
        match event.pointer("/data/object/id").and_then(Value::as_str) {
            Some(intent_id) => {
                info!(intent = %intent_id, "payment event received");
                if let Err(e) = state.lifecycle.confirm_payment(intent_id).await {
                    // Acknowledged anyway; reconciliation picks up the rest.
                    error!(intent = %intent_id, error = %e, "payment confirmation failed");
                }
            }
            None => warn!("payment_intent.succeeded without an intent id"),
        }
    } else {
        info!(event_type, "ignoring webhook event type");
    }

    Ok(Json(json!({ "received": true })))
}

/// A missing or non-numeric count must render the HTML error page, not a
/// plain-text rejection, so the query is parsed by hand.
fn scan_count(params: &HashMap<String, String>) -> Option<i64> {
    params.get("count")?.parse().ok()
}

pub async fn scan(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<String> {
    let Some(count) = scan_count(&params) else {
        return Html(pages::bad_request_page());
    };
    match state.lifecycle.record_scan(count).await {
        Ok(outcome) => Html(pages::scan_page(count, outcome)),
        Err(e) => {
            error!(count, error = %e, "scan failed");
            Html(pages::error_page())
        }
    }
}

pub async fn telemetry(
    State(state): State<AppState>,
    Json(request): Json<TelemetryRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state.lifecycle.record_telemetry(&request).await?;
    let body = match outcome {
        TelemetryOutcome::Created { record_id } => {
            json!({ "status": "created", "record_id": record_id })
        }
        TelemetryOutcome::Updated { record_id } => {
            json!({ "status": "updated", "record_id": record_id })
        }
        TelemetryOutcome::Noop { record_id } => {
            json!({ "status": "noop", "record_id": record_id })
        }
    };
    Ok(Json(body))
}

fn authorize_cron(headers: &HeaderMap, secret: &str) -> bool {
    if let Some(value) = headers.get("x-cron-secret").and_then(|v| v.to_str().ok()) {
        if value == secret {
            return true;
        }
    }
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return token == secret;
        }
    }
    false
}

pub async fn reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReconcileSummary>, ApiError> {
    if !authorize_cron(&headers, &state.cron_secret) {
        warn!("reconcile called without valid secret");
        return Err(ApiError::Unauthorized);
    }
    let summary = state.lifecycle.reconcile_pending().await?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
pub struct QuoteParams {
    count: i64,
    email: String,
}

pub async fn quote_pdf(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> Result<Response, ApiError> {
    let bytes = state
        .lifecycle
        .fetch_quote_pdf(params.count, &params.email)
        .await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/pdf")],
        bytes,
    )
        .into_response())
}

pub async fn archive_quote(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<ArchiveOutcome>, ApiError> {
    let outcome = state
        .lifecycle
        .save_quote_pdf(params.count, &params.email)
        .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn scan_count_requires_a_numeric_count() {
        let mut params = HashMap::new();
        assert_eq!(scan_count(&params), None);
        params.insert("count".to_string(), "abc".to_string());
        assert_eq!(scan_count(&params), None);
        params.insert("count".to_string(), "42".to_string());
        assert_eq!(scan_count(&params), Some(42));
    }

    #[test]
    fn cron_auth_accepts_either_header() {
        let mut headers = HeaderMap::new();
        assert!(!authorize_cron(&headers, "s3cret"));

        headers.insert("x-cron-secret", HeaderValue::from_static("s3cret"));
        assert!(authorize_cron(&headers, "s3cret"));

        let mut bearer = HeaderMap::new();
        bearer.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer s3cret"),
        );
        assert!(authorize_cron(&bearer, "s3cret"));

        let mut wrong = HeaderMap::new();
        wrong.insert("x-cron-secret", HeaderValue::from_static("nope"));
        assert!(!authorize_cron(&wrong, "s3cret"));
    }
}
