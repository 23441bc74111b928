//! Collaborator traits implemented by the adapter crates.
//!
//! The record-store seam is split in two: [`RecordStore`] hands out a
//! short-lived [`RecordSession`] at the start of each lifecycle operation,
//! so credentials are never cached across invocations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::email::OutboundEmail;
use crate::error::{BlobError, EmailError, RecordError, StoreError};
use crate::order::{Delivery, DeliveryStatus, Order, OrderId, PdfKind, PdfRef};
use crate::work::ProductLine;

/// Customer record to create in the record store.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub vat: Option<String>,
}

/// Opportunity record to create in the record store.
#[derive(Debug, Clone, Default)]
pub struct NewOpportunity {
    pub title: String,
    pub contact_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub partner_id: i64,
    pub partner_name: Option<String>,
    pub consumption: f64,
    pub capacity: f64,
    pub invest_ttc: f64,
    pub delivery_pref: String,
    pub description: String,
}

/// Quotation record to create in the record store.
#[derive(Debug, Clone, Default)]
pub struct NewQuotation {
    pub partner_id: i64,
    pub platform_count: i64,
    pub delivery_pref: String,
    pub note: String,
}

/// A payment transaction looked up by provider reference.
#[derive(Debug, Clone)]
pub struct PaymentTransaction {
    pub state: String,
    pub sale_order_ids: Vec<i64>,
}

/// Invoice payment state for a quotation, as seen by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoicePaymentState {
    /// The quotation has no invoice yet.
    NoInvoice,
    /// The first invoice's payment state (e.g. "paid", "not_paid").
    State(String),
}

/// Report templates renderable by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Quotation report, rendered against a sale order.
    Quotation,
    /// Invoice report, rendered against an invoice record.
    Invoice,
    /// Delivery slip, rendered against a sale order.
    DeliveryNote,
}

/// An existing funnel telemetry record.
#[derive(Debug, Clone, Default)]
pub struct FunnelSession {
    pub record_id: i64,
    pub clicked_order_count: i64,
    pub event_log: String,
}

/// Minimal fields for a fresh funnel telemetry record.
#[derive(Debug, Clone, Default)]
pub struct NewFunnelSession {
    pub session_id: String,
    pub step: String,
    pub order_sent: bool,
    pub clicked_order_count: i64,
    pub consumption_input: Option<f64>,
    pub lang: Option<String>,
}

/// Hands out short-lived authenticated sessions against the record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    type Session: RecordSession;

    /// Authenticate and return a session valid for one lifecycle operation.
    async fn connect(&self) -> Result<Self::Session, RecordError>;
}

/// One authenticated session against the record store.
#[async_trait]
pub trait RecordSession: Send + Sync {
    async fn create_customer(&self, customer: &NewCustomer) -> Result<i64, RecordError>;

    async fn create_opportunity(&self, opportunity: &NewOpportunity) -> Result<i64, RecordError>;

    async fn create_quotation(&self, quotation: &NewQuotation) -> Result<i64, RecordError>;

    async fn add_quotation_line(
        &self,
        quotation_id: i64,
        line: &ProductLine,
    ) -> Result<(), RecordError>;

    /// Official order name (e.g. "S00042"), if readable.
    async fn quotation_name(&self, quotation_id: i64) -> Result<Option<String>, RecordError>;

    /// Absolute customer portal URL for online signing.
    async fn portal_url(&self, quotation_id: i64) -> Result<Option<String>, RecordError>;

    /// Workflow state of the sale order ("draft", "sent", "sale", ...).
    async fn quotation_state(&self, quotation_id: i64) -> Result<String, RecordError>;

    /// Look up a payment transaction by provider reference.
    async fn find_payment_transaction(
        &self,
        provider_reference: &str,
    ) -> Result<Option<PaymentTransaction>, RecordError>;

    /// The platform count stamped on a sale order, if any.
    async fn platform_count(&self, quotation_id: i64) -> Result<Option<i64>, RecordError>;

    /// First posted invoice attached to a sale order, if any.
    async fn find_posted_invoice(&self, quotation_id: i64) -> Result<Option<i64>, RecordError>;

    /// Payment state of a quotation's first invoice.
    async fn invoice_payment_state(
        &self,
        quotation_id: i64,
    ) -> Result<InvoicePaymentState, RecordError>;

    /// Render a report to PDF bytes.
    async fn render_report(&self, kind: ReportKind, record_id: i64) -> Result<Vec<u8>, RecordError>;

    /// Find a funnel telemetry record by session id.
    async fn find_funnel_session(
        &self,
        session_id: &str,
    ) -> Result<Option<FunnelSession>, RecordError>;

    /// Create a funnel telemetry record, returning its id.
    async fn create_funnel_session(&self, session: &NewFunnelSession) -> Result<i64, RecordError>;

    /// Apply a partial field update to a funnel telemetry record.
    async fn update_funnel_session(
        &self,
        record_id: i64,
        values: &Map<String, Value>,
    ) -> Result<(), RecordError>;
}

/// The order document store.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically reserve the next platform count.
    async fn reserve_count(&self) -> Result<i64, StoreError>;

    async fn insert_order(&self, order: &Order) -> Result<OrderId, StoreError>;

    async fn find_by_count(&self, count: i64) -> Result<Option<(OrderId, Order)>, StoreError>;

    async fn find_by_count_and_email(
        &self,
        count: i64,
        email: &str,
    ) -> Result<Option<(OrderId, Order)>, StoreError>;

    /// Orders still awaiting payment, for the reconciliation sweep.
    async fn list_pending_payment(&self) -> Result<Vec<(OrderId, Order)>, StoreError>;

    /// Transition the order to paid, stamping `paid_at`.
    async fn mark_paid(&self, id: &OrderId, paid_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Initialize the delivery sub-record.
    async fn set_delivery(&self, id: &OrderId, delivery: &Delivery) -> Result<(), StoreError>;

    /// Advance the delivery status, stamping the transition timestamp.
    async fn set_delivery_status(
        &self,
        id: &OrderId,
        status: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Record an uploaded PDF under its kind. Append-only.
    async fn record_pdf(
        &self,
        id: &OrderId,
        kind: PdfKind,
        pdf: &PdfRef,
    ) -> Result<(), StoreError>;

    /// Mark a side effect as completed.
    async fn mark_effect(&self, id: &OrderId, effect: &str) -> Result<(), StoreError>;
}

/// Path-addressed blob storage with time-limited read URLs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), BlobError>;

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BlobError>;

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, BlobError>;
}

/// Fire-and-forget transactional email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), EmailError>;
}
