//! [`BlobStore`] over the Cloud Storage JSON API, with V4 query-string
//! signed URLs so quote PDFs can be linked in email without making the
//! bucket public.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};
use tracing::debug;

use order_core::{BlobError, BlobStore};

use crate::auth::TokenProvider;
use crate::config::FirebaseConfig;

const STORAGE_HOST: &str = "storage.googleapis.com";

/// Everything except RFC 3986 unreserved characters.
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// As above, but `/` stays literal in object paths.
const PATH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Cloud Storage blob store bound to one bucket.
#[derive(Clone)]
pub struct CloudStorage {
    http: Client,
    tokens: Arc<TokenProvider>,
    bucket: String,
    client_email: String,
    signing_key: Arc<RsaPrivateKey>,
}

impl CloudStorage {
    pub(crate) fn new(
        http: Client,
        tokens: Arc<TokenProvider>,
        config: &FirebaseConfig,
    ) -> Result<Self, BlobError> {
        let signing_key = RsaPrivateKey::from_pkcs8_pem(config.private_key())
            .map_err(|e| BlobError::Sign(format!("service account private key: {}", e)))?;
        Ok(Self {
            http,
            tokens,
            bucket: config.bucket.clone(),
            client_email: config.client_email.clone(),
            signing_key: Arc::new(signing_key),
        })
    }

    /// Build a V4 signed URL valid from `now` for `ttl`.
    fn signed_url_at(
        &self,
        path: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, BlobError> {
        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/auto/storage/goog4_request", date);
        let credential = format!("{}/{}", self.client_email, scope);

        let canonical_uri = format!(
            "/{}/{}",
            self.bucket,
            utf8_percent_encode(path, PATH_ENCODE)
        );
        let canonical_query = canonical_query(&credential, &datetime, ttl.as_secs());
        let request = canonical_request(&canonical_uri, &canonical_query);
        let to_sign = string_to_sign(&datetime, &scope, &request);

        let digest = Sha256::digest(to_sign.as_bytes());
        let signature = self
            .signing_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| BlobError::Sign(e.to_string()))?;

        Ok(format!(
            "https://{}{}?{}&X-Goog-Signature={}",
            STORAGE_HOST,
            canonical_uri,
            canonical_query,
            hex::encode(signature)
        ))
    }
}

/// Sorted query string shared between the canonical request and the URL.
fn canonical_query(credential: &str, datetime: &str, expires_secs: u64) -> String {
    format!(
        "X-Goog-Algorithm=GOOG4-RSA-SHA256\
         &X-Goog-Credential={}\
         &X-Goog-Date={}\
         &X-Goog-Expires={}\
         &X-Goog-SignedHeaders=host",
        utf8_percent_encode(credential, QUERY_ENCODE),
        datetime,
        expires_secs
    )
}

fn canonical_request(canonical_uri: &str, canonical_query: &str) -> String {
    format!(
        "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
        canonical_uri, canonical_query, STORAGE_HOST
    )
}

fn string_to_sign(datetime: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "GOOG4-RSA-SHA256\n{}\n{}\n{}",
        datetime,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

#[async_trait]
impl BlobStore for CloudStorage {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), BlobError> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(|e| BlobError::Auth(e.to_string()))?;
        let url = format!(
            "https://{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            STORAGE_HOST,
            self.bucket,
            utf8_percent_encode(path, QUERY_ENCODE)
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| BlobError::Http(format!("upload {}: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Http(format!(
                "upload {} returned {}: {}",
                path, status, body
            )));
        }
        debug!(path, size = bytes.len(), "blob uploaded");
        Ok(())
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(|e| BlobError::Auth(e.to_string()))?;
        // Object names are a single URL segment here, so `/` is encoded too.
        let url = format!(
            "https://{}/storage/v1/b/{}/o/{}?alt=media",
            STORAGE_HOST,
            self.bucket,
            utf8_percent_encode(path, QUERY_ENCODE)
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| BlobError::Http(format!("fetch {}: {}", path, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Http(format!(
                "fetch {} returned {}: {}",
                path, status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BlobError::Http(format!("fetch {}: {}", path, e)))?;
        Ok(bytes.to_vec())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, BlobError> {
        self.signed_url_at(path, ttl, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_query_escapes_credential() {
        let query = canonical_query(
            "orders@voltra-prod.iam.gserviceaccount.com/20260301/auto/storage/goog4_request",
            "20260301T090000Z",
            604800,
        );
        assert!(query.contains("X-Goog-Algorithm=GOOG4-RSA-SHA256"));
        assert!(query.contains(
            "X-Goog-Credential=orders%40voltra-prod.iam.gserviceaccount.com%2F20260301%2Fauto%2Fstorage%2Fgoog4_request"
        ));
        assert!(query.contains("X-Goog-Expires=604800"));
        assert!(query.ends_with("X-Goog-SignedHeaders=host"));
    }

    #[test]
    fn canonical_request_shape() {
        let request = canonical_request("/bucket/requests/42/devis-unsigned-7.pdf", "a=b");
        let lines: Vec<&str> = request.split('\n').collect();
        assert_eq!(
            lines,
            vec![
                "GET",
                "/bucket/requests/42/devis-unsigned-7.pdf",
                "a=b",
                "host:storage.googleapis.com",
                "",
                "host",
                "UNSIGNED-PAYLOAD",
            ]
        );
    }

    #[test]
    fn string_to_sign_hashes_request() {
        let to_sign = string_to_sign(
            "20260301T090000Z",
            "20260301/auto/storage/goog4_request",
            "GET\n/x\n\nhost:storage.googleapis.com\n\nhost\nUNSIGNED-PAYLOAD",
        );
        let lines: Vec<&str> = to_sign.split('\n').collect();
        assert_eq!(lines[0], "GOOG4-RSA-SHA256");
        assert_eq!(lines[1], "20260301T090000Z");
        assert_eq!(lines[2], "20260301/auto/storage/goog4_request");
        // hex sha256 of the canonical request
        assert_eq!(lines[3].len(), 64);
    }
}
