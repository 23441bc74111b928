//! Error types shared across the collaborator traits.

use thiserror::Error;

/// Errors from the order document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or HTTP-level failure talking to the store.
    #[error("store request failed: {0}")]
    Http(String),

    /// Authentication against the store failed.
    #[error("store authentication failed: {0}")]
    Auth(String),

    /// A response could not be decoded into the expected shape.
    #[error("failed to decode store response: {0}")]
    Decode(String),

    /// The transactional counter update could not be committed.
    #[error("counter transaction failed: {0}")]
    Transaction(String),

    /// Referenced document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Missing or invalid configuration.
    #[error("store configuration error: {0}")]
    Config(String),
}

/// Errors from the external record store (ERP).
#[derive(Debug, Error)]
pub enum RecordError {
    /// Network or HTTP-level failure.
    #[error("record store request failed: {0}")]
    Http(String),

    /// Session authentication failed or returned no session cookie.
    #[error("record store authentication failed: {0}")]
    Auth(String),

    /// The RPC endpoint returned an error payload.
    #[error("record store RPC error: {0}")]
    Rpc(String),

    /// A response could not be decoded into the expected shape.
    #[error("failed to decode record store response: {0}")]
    Decode(String),

    /// A record that must exist was not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A rendered report came back with the wrong content type.
    #[error("report rendering did not return a PDF: {0}")]
    NotPdf(String),

    /// Missing or invalid configuration.
    #[error("record store configuration error: {0}")]
    Config(String),
}

/// Errors from object storage.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Network or HTTP-level failure.
    #[error("blob store request failed: {0}")]
    Http(String),

    /// Authentication against the bucket failed.
    #[error("blob store authentication failed: {0}")]
    Auth(String),

    /// URL signing failed.
    #[error("failed to sign URL: {0}")]
    Sign(String),

    /// Object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),
}

/// Errors from the email sender.
#[derive(Debug, Error)]
pub enum EmailError {
    /// Network or HTTP-level failure.
    #[error("email request failed: {0}")]
    Http(String),

    /// The provider rejected the message.
    #[error("email rejected: {0}")]
    Rejected(String),

    /// Invalid address or message construction failure.
    #[error("failed to build email: {0}")]
    Build(String),
}

/// Input validation failures, rejected before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{0} is missing")]
    Missing(&'static str),

    /// An order line failed numeric validation.
    #[error("invalid order line {index}: {reason}")]
    InvalidLine { index: usize, reason: &'static str },
}
