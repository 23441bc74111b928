//! Quote/invoice document handling: rendering, archival, retrieval.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use order_core::{
    BlobStore, EmailSender, Order, OrderId, OrderStore, PaymentStatus, PdfKind, PdfRef,
    RecordSession, RecordStore, ReportKind,
};

use crate::error::LifecycleError;
use crate::Lifecycle;

/// Result of archiving the unsigned quote PDF.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveOutcome {
    pub storage_path: String,
    pub signed_url: String,
    /// True when the PDF was already on file and nothing was re-uploaded.
    pub already_archived: bool,
}

fn pdf_slug(kind: PdfKind) -> &'static str {
    match kind {
        PdfKind::DevisUnsigned => "devis-unsigned",
        PdfKind::DevisSigned => "devis-signed",
        PdfKind::Invoice => "invoice",
        PdfKind::SupplierDeliveryNote => "delivery-note",
    }
}

impl<R, O, B, M> Lifecycle<R, O, B, M>
where
    R: RecordStore,
    O: OrderStore,
    B: BlobStore,
    M: EmailSender,
{
    /// Render and archive a PDF of `kind` unless the order already has one,
    /// returning the bytes either way.
    ///
    /// Each kind is generated at most once per order; on replay the stored
    /// object is fetched back instead of re-rendered.
    pub(crate) async fn ensure_pdf(
        &self,
        session: &R::Session,
        order_id: &OrderId,
        order: &mut Order,
        kind: PdfKind,
        report: ReportKind,
        record_id: i64,
    ) -> Result<Vec<u8>, LifecycleError> {
        if let Some(existing) = order.pdfs.get(&kind) {
            return Ok(self.blobs.fetch(&existing.storage_path).await?);
        }

        let bytes = session.render_report(report, record_id).await?;
        let path = format!(
            "requests/{}/{}-{}.pdf",
            order.platform_count,
            pdf_slug(kind),
            record_id
        );
        self.blobs.upload(&path, &bytes, "application/pdf").await?;
        let signed_url = self
            .blobs
            .signed_url(&path, self.config.signed_url_ttl)
            .await?;
        let pdf = PdfRef {
            storage_path: path.clone(),
            signed_url,
            created_at: Utc::now(),
        };
        self.orders.record_pdf(order_id, kind, &pdf).await?;
        order.pdfs.insert(kind, pdf);
        info!(count = order.platform_count, path, "PDF archived");
        Ok(bytes)
    }

    /// Fetch the quotation PDF for a paid order, as raw bytes.
    pub async fn fetch_quote_pdf(
        &self,
        count: i64,
        email: &str,
    ) -> Result<Vec<u8>, LifecycleError> {
        let (_, order) = self
            .orders
            .find_by_count_and_email(count, email)
            .await?
            .ok_or(LifecycleError::UnknownOrder(count))?;
        if order.payment_status != PaymentStatus::Paid {
            return Err(LifecycleError::NotPaid(count));
        }

        let session = self.records.connect().await?;
        Ok(session
            .render_report(ReportKind::Quotation, order.quotation_id)
            .await?)
    }

    /// Archive the unsigned quote PDF for an order that is missing one.
    ///
    /// This is the regeneration path for intakes whose best-effort PDF step
    /// failed.
    pub async fn save_quote_pdf(
        &self,
        count: i64,
        email: &str,
    ) -> Result<ArchiveOutcome, LifecycleError> {
        let (order_id, mut order) = self
            .orders
            .find_by_count_and_email(count, email)
            .await?
            .ok_or(LifecycleError::UnknownOrder(count))?;

        if let Some(existing) = order.pdfs.get(&PdfKind::DevisUnsigned) {
            return Ok(ArchiveOutcome {
                storage_path: existing.storage_path.clone(),
                signed_url: existing.signed_url.clone(),
                already_archived: true,
            });
        }

        let session = self.records.connect().await?;
        self.store_quote_pdf(&session, &order_id, &mut order).await?;

        let pdf = order
            .pdfs
            .get(&PdfKind::DevisUnsigned)
            .ok_or_else(|| LifecycleError::UnknownOrder(count))?;
        Ok(ArchiveOutcome {
            storage_path: pdf.storage_path.clone(),
            signed_url: pdf.signed_url.clone(),
            already_archived: false,
        })
    }
}
