//! Intake: one simulator submission becomes ERP records, an order
//! document, and a quotation email.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use order_core::{
    classify_work, effects, validate_lines, Address, BlobStore, ClientInfo, EmailAttachment,
    EmailSender, NewCustomer, NewOpportunity, NewQuotation, Order, OrderId, OrderStore,
    PaymentStatus, PdfKind, PdfRef, ProductLine, RecordSession, RecordStore, ReportKind,
    ValidationError, Work,
};

use crate::emails::quote_email;
use crate::error::LifecycleError;
use crate::Lifecycle;

/// Client identity and address as submitted by the funnel frontend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntakeClient {
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
    pub street: String,
    #[serde(default)]
    pub street_number: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub delivery_pref: Option<String>,
}

/// Simulation figures carried into the opportunity record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationSummary {
    #[serde(default)]
    pub consumption: f64,
    #[serde(default)]
    pub capacity: f64,
    #[serde(default)]
    pub invest_ttc: f64,
    #[serde(default)]
    pub description: String,
}

/// One intake submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntakeRequest {
    pub client: IntakeClient,
    #[serde(default)]
    pub simulation: SimulationSummary,
    #[serde(default)]
    pub order_products: Vec<ProductLine>,
    #[serde(default)]
    pub source: Option<String>,
}

/// What intake produced.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    pub platform_count: i64,
    pub quotation_id: i64,
    pub order_id: OrderId,
    pub request_number: Option<String>,
    pub portal_url: Option<String>,
    pub work: Work,
}

fn validate(request: &IntakeRequest) -> Result<(), ValidationError> {
    if request.client.first_name.trim().is_empty() {
        return Err(ValidationError::Missing("first_name"));
    }
    if request.client.last_name.trim().is_empty() {
        return Err(ValidationError::Missing("last_name"));
    }
    if request.client.email.trim().is_empty() {
        return Err(ValidationError::Missing("email"));
    }
    validate_lines(&request.order_products)
}

impl<R, O, B, M> Lifecycle<R, O, B, M>
where
    R: RecordStore,
    O: OrderStore,
    B: BlobStore,
    M: EmailSender,
{
    /// Process one intake submission.
    ///
    /// Everything up to the order-store write is mandatory and aborts the
    /// intake on failure; the quote PDF and email are best-effort and can
    /// be regenerated later via [`Lifecycle::save_quote_pdf`].
    pub async fn intake(&self, request: &IntakeRequest) -> Result<IntakeOutcome, LifecycleError> {
        // 1. Validate before any external write.
        validate(request)?;

        // 2. Reserve the platform count. A crash from here on burns the
        //    value; counts stay strictly increasing either way.
        let count = self.orders.reserve_count().await?;
        info!(count, "platform count reserved");

        // 3. ERP records: customer, opportunity, quotation, lines.
        let session = self.records.connect().await?;
        let client = &request.client;

        let partner_id = session
            .create_customer(&NewCustomer {
                name: format!("{} {}", client.first_name, client.last_name),
                email: client.email.clone(),
                phone: client.phone.clone(),
                street: join_street(&client.street, &client.street_number),
                zip: client.zip.clone(),
                city: client.city.clone(),
                vat: client.vat.clone(),
            })
            .await?;

        session
            .create_opportunity(&NewOpportunity {
                title: format!("Demande #{} — {} {}", count, client.first_name, client.last_name),
                contact_name: format!("{} {}", client.first_name, client.last_name),
                email: client.email.clone(),
                phone: client.phone.clone(),
                street: join_street(&client.street, &client.street_number),
                zip: client.zip.clone(),
                city: client.city.clone(),
                partner_id,
                partner_name: client.company.clone(),
                consumption: request.simulation.consumption,
                capacity: request.simulation.capacity,
                invest_ttc: request.simulation.invest_ttc,
                delivery_pref: client.delivery_pref.clone().unwrap_or_default(),
                description: request.simulation.description.clone(),
            })
            .await?;

        let quotation_id = session
            .create_quotation(&NewQuotation {
                partner_id,
                platform_count: count,
                delivery_pref: client.delivery_pref.clone().unwrap_or_default(),
                note: request.simulation.description.clone(),
            })
            .await?;
        for line in &request.order_products {
            session.add_quotation_line(quotation_id, line).await?;
        }

        let request_number = session.quotation_name(quotation_id).await?;
        let portal_url = session.portal_url(quotation_id).await.unwrap_or_else(|e| {
            warn!(quotation_id, error = %e, "portal URL unavailable");
            None
        });

        // 4. Work classification, derived once and never recomputed.
        let work = classify_work(&request.order_products);

        // 5. Persist the order document.
        let now = Utc::now();
        let mut order = Order {
            platform_count: count,
            quotation_id,
            request_number: request_number.clone(),
            payment_status: PaymentStatus::Pending,
            client: ClientInfo {
                first_name: client.first_name.clone(),
                last_name: client.last_name.clone(),
                email: client.email.clone(),
                phone: client.phone.clone(),
                company: client.company.clone(),
                vat: client.vat.clone(),
                delivery_pref: client.delivery_pref.clone(),
            },
            address: Address {
                street: client.street.clone(),
                number: client.street_number.clone(),
                zipcode: client.zip.clone(),
                city: client.city.clone(),
            },
            work,
            delivery: None,
            pdfs: Default::default(),
            effects: Default::default(),
            source: request
                .source
                .clone()
                .unwrap_or_else(|| "simulateur_ui".to_string()),
            created_at: now,
            paid_at: None,
            updated_at: None,
        };
        let order_id = self.orders.insert_order(&order).await?;
        info!(count, quotation_id, order_id = %order_id, "order created");

        // 6. Best effort: quote PDF + email. Failures leave a valid order.
        let pdf = match self
            .store_quote_pdf(&session, &order_id, &mut order)
            .await
        {
            Ok(bytes) => Some(EmailAttachment::pdf(
                format!("devis-{}.pdf", count),
                bytes,
            )),
            Err(e) => {
                warn!(count, error = %e, "quote PDF generation failed");
                None
            }
        };

        if !order.effect_done(effects::EMAIL_QUOTE) {
            let email = quote_email(&order, portal_url.as_deref(), pdf);
            match self.mailer.send(&email).await {
                Ok(()) => {
                    if let Err(e) = self.orders.mark_effect(&order_id, effects::EMAIL_QUOTE).await {
                        warn!(count, error = %e, "failed to record quote email effect");
                    }
                }
                Err(e) => warn!(count, error = %e, "quote email failed"),
            }
        }

        Ok(IntakeOutcome {
            platform_count: count,
            quotation_id,
            order_id,
            request_number,
            portal_url,
            work,
        })
    }

    /// Render, upload, and record the unsigned quotation PDF.
    pub(crate) async fn store_quote_pdf(
        &self,
        session: &R::Session,
        order_id: &OrderId,
        order: &mut Order,
    ) -> Result<Vec<u8>, LifecycleError> {
        let bytes = session
            .render_report(ReportKind::Quotation, order.quotation_id)
            .await?;
        let path = format!(
            "requests/{}/devis-unsigned-{}.pdf",
            order.platform_count, order.quotation_id
        );
        self.blobs.upload(&path, &bytes, "application/pdf").await?;
        let signed_url = self
            .blobs
            .signed_url(&path, self.config.signed_url_ttl)
            .await?;
        let pdf = PdfRef {
            storage_path: path,
            signed_url,
            created_at: Utc::now(),
        };
        self.orders
            .record_pdf(order_id, PdfKind::DevisUnsigned, &pdf)
            .await?;
        order.pdfs.insert(PdfKind::DevisUnsigned, pdf);
        Ok(bytes)
    }
}

fn join_street(street: &str, number: &str) -> String {
    if number.is_empty() {
        street.to_string()
    } else {
        format!("{} {}", street, number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_is_rejected() {
        let request = IntakeRequest {
            client: IntakeClient {
                first_name: "Ada".into(),
                last_name: "".into(),
                email: "ada@example.com".into(),
                ..Default::default()
            },
            order_products: vec![ProductLine {
                product_ref: 4,
                quantity: 1,
                unit_price: 100.0,
            }],
            ..Default::default()
        };
        assert_eq!(validate(&request), Err(ValidationError::Missing("last_name")));
    }

    #[test]
    fn street_number_is_appended() {
        assert_eq!(join_street("Rue Haute", "12"), "Rue Haute 12");
        assert_eq!(join_street("Rue Haute", ""), "Rue Haute");
    }
}
