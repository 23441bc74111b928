//! Service-account OAuth: a signed JWT assertion exchanged for a bearer token.

use std::time::{Duration, Instant};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use order_core::StoreError;

use crate::config::FirebaseConfig;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str =
    "https://www.googleapis.com/auth/datastore https://www.googleapis.com/auth/devstorage.read_write";

/// Tokens are valid for an hour; refresh a minute early.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    refresh_after: Instant,
}

/// Mints and caches OAuth bearer tokens for the Google REST APIs.
pub(crate) struct TokenProvider {
    http: Client,
    encoding_key: EncodingKey,
    client_email: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub(crate) fn new(http: Client, config: &FirebaseConfig) -> Result<Self, StoreError> {
        let encoding_key = EncodingKey::from_rsa_pem(config.private_key().as_bytes())
            .map_err(|e| StoreError::Config(format!("service account private key: {}", e)))?;
        Ok(Self {
            http,
            encoding_key,
            client_email: config.client_email.clone(),
            cached: Mutex::new(None),
        })
    }

    /// A valid bearer token, minting a fresh one when the cache has expired.
    pub(crate) async fn bearer_token(&self) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_after {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.mint().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn mint(&self) -> Result<CachedToken, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: SCOPES,
            aud: TOKEN_URL,
            iat: now,
            exp: now + 3600,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| StoreError::Auth(format!("failed to sign assertion: {}", e)))?;

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Http(format!("token exchange: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!(
                "token exchange returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("token response: {}", e)))?;

        debug!(expires_in = token.expires_in, "minted OAuth token");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        Ok(CachedToken {
            access_token: token.access_token,
            refresh_after: Instant::now() + lifetime,
        })
    }
}
