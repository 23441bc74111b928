//! HTTP plumbing: authentication and the JSON-RPC `call_kw` envelope.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use order_core::RecordError;

use crate::config::OdooConfig;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Serialize)]
struct RpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error payload. Odoo nests the useful message under `data`.
#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
    #[serde(default)]
    data: Option<RpcErrorData>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorData {
    #[serde(default)]
    message: Option<String>,
}

impl RpcError {
    fn detail(&self) -> String {
        match self.data.as_ref().and_then(|d| d.message.clone()) {
            Some(inner) => format!("{}: {}", self.message, inner),
            None => self.message.clone(),
        }
    }
}

/// Client holding credentials for the Odoo instance.
///
/// Cheap to clone; the HTTP connection pool is shared.
#[derive(Debug, Clone)]
pub struct OdooClient {
    http: Client,
    config: Arc<OdooConfig>,
}

impl OdooClient {
    /// Create a client from the given configuration.
    pub fn new(config: OdooConfig) -> Result<Self, RecordError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RecordError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self, RecordError> {
        Self::new(OdooConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &OdooConfig {
        &self.config
    }

    /// Authenticate and return a short-lived session.
    pub async fn login(&self) -> Result<OdooSession, RecordError> {
        let url = format!("{}/web/session/authenticate", self.config.url);
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: json!({
                "db": self.config.db,
                "login": self.config.login,
                "password": self.config.password(),
            }),
            id: 1,
        };

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RecordError::Http(format!("authenticate: {}", e)))?;

        let session_id = extract_session_cookie(response.headers())
            .ok_or_else(|| RecordError::Auth("no session cookie returned".to_string()))?;

        // Consume the body so a JSON-RPC error surfaces even with a cookie set.
        let body: RpcResponse<Value> = response
            .json()
            .await
            .map_err(|e| RecordError::Decode(format!("authenticate: {}", e)))?;
        if let Some(error) = body.error {
            return Err(RecordError::Auth(error.detail()));
        }

        info!(url = %self.config.url, db = %self.config.db, "Odoo session opened");

        Ok(OdooSession {
            http: self.http.clone(),
            base_url: self.config.url.clone(),
            cookie: format!("session_id={}", session_id),
            request_id: AtomicU64::new(1),
        })
    }
}

fn extract_session_cookie(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|cookie| cookie.contains("session_id"))
        .and_then(|cookie| cookie.split(';').next())
        .and_then(|pair| pair.strip_prefix("session_id="))
        .map(|id| id.to_string())
}

/// One authenticated session, valid for a single lifecycle operation.
#[derive(Debug)]
pub struct OdooSession {
    http: Client,
    base_url: String,
    cookie: String,
    request_id: AtomicU64,
}

impl OdooSession {
    /// Make a `call_kw` RPC against a model method.
    pub(crate) async fn call_kw<R: for<'de> Deserialize<'de>>(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<R, RecordError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let url = format!("{}/web/dataset/call_kw", self.base_url);

        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: json!({
                "model": model,
                "method": method,
                "args": args,
                "kwargs": kwargs,
            }),
            id,
        };

        debug!(model, method, id, "call_kw");

        let response = self
            .http
            .post(&url)
            .header("Cookie", &self.cookie)
            .json(&request)
            .send()
            .await
            .map_err(|e| RecordError::Http(format!("{}.{}: {}", model, method, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecordError::Http(format!(
                "{}.{}: HTTP {}: {}",
                model, method, status, body
            )));
        }

        let rpc: RpcResponse<R> = response
            .json()
            .await
            .map_err(|e| RecordError::Decode(format!("{}.{}: {}", model, method, e)))?;

        if let Some(error) = rpc.error {
            return Err(RecordError::Rpc(format!(
                "{}.{}: {}",
                model,
                method,
                error.detail()
            )));
        }

        rpc.result
            .ok_or_else(|| RecordError::Decode(format!("{}.{}: empty result", model, method)))
    }

    /// Fetch a rendered report as PDF bytes.
    ///
    /// Odoo answers an HTML login page instead of a PDF when the session is
    /// not accepted, so the content type is checked before trusting the body.
    pub(crate) async fn fetch_report_pdf(
        &self,
        report: &str,
        record_id: i64,
    ) -> Result<Vec<u8>, RecordError> {
        let url = format!("{}/report/pdf/{}/{}", self.base_url, report, record_id);
        debug!(report, record_id, "fetching report PDF");

        let response = self
            .http
            .get(&url)
            .header("Cookie", &self.cookie)
            .send()
            .await
            .map_err(|e| RecordError::Http(format!("report {}: {}", report, e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RecordError::Http(format!("report {}: {}", report, e)))?;

        if !status.is_success() || !content_type.contains("application/pdf") {
            let preview: String = String::from_utf8_lossy(&bytes).chars().take(200).collect();
            return Err(RecordError::NotPdf(format!(
                "report {} for {} returned {} ({}): {}",
                report, record_id, status, content_type, preview
            )));
        }

        Ok(bytes.to_vec())
    }

    /// Resolve a relative portal path against the instance base URL.
    pub(crate) fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}
