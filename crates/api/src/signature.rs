//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header carries `t=<unix>,v1=<hex hmac>` pairs.
//! The signed payload is `"{t}.{raw body}"`, keyed with the endpoint
//! secret; the comparison is constant-time and the timestamp must be
//! within a fixed tolerance to stop replays.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between Stripe's timestamp and ours.
const TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq, Eq)]
pub enum SignatureError {
    /// Header absent or not in `t=...,v1=...` form.
    Malformed,
    /// Timestamp outside the tolerance window.
    Expired,
    /// No candidate signature matched.
    Mismatch,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SignatureError::Malformed => "malformed signature header",
            SignatureError::Expired => "signature timestamp outside tolerance",
            SignatureError::Mismatch => "signature mismatch",
        };
        f.write_str(reason)
    }
}

/// Parsed `Stripe-Signature` header.
struct SignatureHeader {
    timestamp: i64,
    candidates: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for pair in header.split(',') {
        let Some((key, value)) = pair.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    Ok(SignatureHeader {
        timestamp,
        candidates,
    })
}

/// Verify a webhook payload against its signature header.
pub fn verify(
    secret: &str,
    header: &str,
    body: &[u8],
    now_unix: i64,
) -> Result<(), SignatureError> {
    let parsed = parse_header(header)?;
    if (now_unix - parsed.timestamp).abs() > TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    for candidate in &parsed.candidates {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::Malformed)?;
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        // verify_slice is constant-time.
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }
    Err(SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn sign(timestamp: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = format!("t=1700000000,v1={}", sign(1_700_000_000, body));
        assert_eq!(verify(SECRET, &header, body, 1_700_000_100), Ok(()));
    }

    #[test]
    fn any_matching_v1_is_enough() {
        let body = b"payload";
        let header = format!(
            "t=1700000000,v1={},v1={}",
            "ab".repeat(32),
            sign(1_700_000_000, body)
        );
        assert_eq!(verify(SECRET, &header, body, 1_700_000_000), Ok(()));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let body = b"payload";
        let header = format!("t=1700000000,v1={}", sign(1_700_000_000, body));
        assert_eq!(
            verify(SECRET, &header, body, 1_700_000_000 + 301),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn tampered_body_is_rejected() {
        let header = format!("t=1700000000,v1={}", sign(1_700_000_000, b"original"));
        assert_eq!(
            verify(SECRET, &header, b"tampered", 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert_eq!(
            verify(SECRET, "garbage", b"body", 1_700_000_000),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify(SECRET, "t=1700000000", b"body", 1_700_000_000),
            Err(SignatureError::Malformed)
        );
    }
}
