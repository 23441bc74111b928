use thiserror::Error;

use order_core::{BlobError, EmailError, RecordError, StoreError, ValidationError};

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Records(#[from] RecordError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Email(#[from] EmailError),

    /// No order matches the given count (and email, where required).
    #[error("no order found for count {0}")]
    UnknownOrder(i64),

    /// The operation requires a paid order.
    #[error("order {0} is not paid")]
    NotPaid(i64),

    /// Missing or invalid configuration.
    #[error("lifecycle configuration error: {0}")]
    Config(String),
}
