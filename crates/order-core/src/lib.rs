//! Core types and traits for the Voltra order platform.
//!
//! This crate provides the shared vocabulary for every handler in the
//! system. It defines:
//!
//! - [`Order`] and its sub-records — the document-store representation of
//!   one customer request, keyed by `platform_count`
//! - [`PaymentStatus`] / [`DeliveryStatus`] — the forward-only lifecycle
//!   state machines
//! - [`Work`] — the installation-work classification derived from order
//!   lines at intake
//! - [`RetryPolicy`] — the bounded fixed-delay retry used wherever an
//!   external system settles asynchronously
//! - The collaborator traits every adapter implements: [`OrderStore`],
//!   [`RecordStore`], [`BlobStore`], [`EmailSender`]
//!
//! Adapters construct the error enums defined here directly, so callers
//! can stay generic over the trait seams.

mod email;
mod error;
mod order;
mod retry;
mod telemetry;
mod traits;
mod work;

pub use email::{EmailAttachment, OutboundEmail};
pub use error::{BlobError, EmailError, RecordError, StoreError, ValidationError};
pub use order::{
    effects, Address, ClientInfo, Delivery, DeliveryStatus, Order, OrderId, PaymentStatus, PdfKind,
    PdfRef,
};
pub use retry::RetryPolicy;
pub use telemetry::{sanitize_telemetry, TelemetryOutcome, TelemetryRequest, ALLOWED_STEPS};
pub use traits::{
    BlobStore, EmailSender, FunnelSession, InvoicePaymentState, NewCustomer, NewFunnelSession,
    NewOpportunity, NewQuotation, OrderStore, PaymentTransaction, RecordSession, RecordStore,
    ReportKind,
};
pub use work::{classify_work, validate_lines, ProductLine, Work, WorkKind};

// Re-export async_trait so implementors don't need a direct dependency.
pub use async_trait::async_trait;
