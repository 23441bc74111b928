//! The order record and its lifecycle state machines.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::work::Work;

/// Opaque document-store identifier for an order record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Payment lifecycle of an order. Transitions only move forward;
/// `Paid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting payment (simulator intake).
    PendingPayment,
    /// Awaiting payment (lead intake).
    Pending,
    /// Payment confirmed. Terminal.
    Paid,
}

impl PaymentStatus {
    /// Whether this status counts as awaiting payment.
    pub fn is_pending(self) -> bool {
        matches!(self, PaymentStatus::PendingPayment | PaymentStatus::Pending)
    }
}

/// Delivery lifecycle: `Pending -> Shipped -> Received`, forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Shipped,
    Received,
}

impl DeliveryStatus {
    /// The single valid forward transition from this status, if any.
    pub fn next(self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::Pending => Some(DeliveryStatus::Shipped),
            DeliveryStatus::Shipped => Some(DeliveryStatus::Received),
            DeliveryStatus::Received => None,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Shipped => "shipped",
            DeliveryStatus::Received => "received",
        };
        f.write_str(s)
    }
}

/// Delivery sub-record, initialized when an order is invoiced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub status: DeliveryStatus,
    /// Random unguessable token intended to authorize scan actions.
    pub token: String,
    pub initialized_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

impl Delivery {
    /// A fresh pending delivery with a random token.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            status: DeliveryStatus::Pending,
            token: uuid::Uuid::new_v4().to_string(),
            initialized_at: now,
            shipped_at: None,
            received_at: None,
        }
    }
}

/// Document kinds attached to an order. Each is generated at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfKind {
    DevisUnsigned,
    DevisSigned,
    Invoice,
    SupplierDeliveryNote,
}

impl PdfKind {
    /// Stable field name used in the stored document.
    pub fn as_str(self) -> &'static str {
        match self {
            PdfKind::DevisUnsigned => "devis_unsigned",
            PdfKind::DevisSigned => "devis_signed",
            PdfKind::Invoice => "invoice",
            PdfKind::SupplierDeliveryNote => "supplier_delivery_note",
        }
    }
}

/// Reference to an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfRef {
    pub storage_path: String,
    pub signed_url: String,
    pub created_at: DateTime<Utc>,
}

/// Contact snapshot captured at intake, never re-synced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub vat: Option<String>,
    #[serde(default)]
    pub delivery_pref: Option<String>,
}

impl ClientInfo {
    /// Display name: company if present, otherwise "First Last".
    pub fn display_name(&self) -> String {
        match &self.company {
            Some(company) if !company.is_empty() => company.clone(),
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// Address snapshot captured at intake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub number: String,
    pub zipcode: String,
    pub city: String,
}

/// One customer request, keyed by `platform_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique, strictly increasing public identifier.
    pub platform_count: i64,
    /// External sales-order id; set once at creation.
    pub quotation_id: i64,
    /// Official order name from the record store, when read back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_number: Option<String>,
    pub payment_status: PaymentStatus,
    pub client: ClientInfo,
    pub address: Address,
    pub work: Work,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pdfs: BTreeMap<PdfKind, PdfRef>,
    /// Completed externally-visible side effects, keyed by effect name.
    /// Checked before any non-idempotent action.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub effects: BTreeSet<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether a side effect has already been performed for this order.
    pub fn effect_done(&self, name: &str) -> bool {
        self.effects.contains(name)
    }

    /// Whether a PDF of the given kind has already been stored.
    pub fn has_pdf(&self, kind: PdfKind) -> bool {
        self.pdfs.contains_key(&kind)
    }
}

/// Effect names gating non-idempotent side effects.
pub mod effects {
    /// Quotation email sent at intake.
    pub const EMAIL_QUOTE: &str = "email_quote";
    /// Customer confirmation email sent after payment.
    pub const EMAIL_CUSTOMER_PAID: &str = "email_customer_paid";
    /// Internal fulfillment notification sent after payment.
    pub const EMAIL_FULFILLMENT: &str = "email_fulfillment";
    /// Shipped notification sent on the first shipped scan.
    pub const EMAIL_SHIPPED: &str = "email_shipped";
    /// Received notification sent on the first received scan.
    pub const EMAIL_RECEIVED: &str = "email_received";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_status_moves_forward_only() {
        assert_eq!(DeliveryStatus::Pending.next(), Some(DeliveryStatus::Shipped));
        assert_eq!(DeliveryStatus::Shipped.next(), Some(DeliveryStatus::Received));
        assert_eq!(DeliveryStatus::Received.next(), None);
    }

    #[test]
    fn payment_status_serde_names() {
        let json = serde_json::to_string(&PaymentStatus::PendingPayment).unwrap();
        assert_eq!(json, "\"pending_payment\"");
        let back: PaymentStatus = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(back, PaymentStatus::Paid);
    }

    #[test]
    fn fresh_delivery_has_unguessable_token() {
        let a = Delivery::new(Utc::now());
        let b = Delivery::new(Utc::now());
        assert_eq!(a.status, DeliveryStatus::Pending);
        assert_ne!(a.token, b.token);
        assert!(a.token.len() >= 32);
    }

    #[test]
    fn display_name_prefers_company() {
        let mut client = ClientInfo {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            ..Default::default()
        };
        assert_eq!(client.display_name(), "Ada Lovelace");
        client.company = Some("Analytical SA".into());
        assert_eq!(client.display_name(), "Analytical SA");
    }
}
