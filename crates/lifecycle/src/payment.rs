//! Payment confirmation: an authenticated payment event becomes a paid
//! order, its documents, a delivery record, and the confirmation emails.
//!
//! Every step tolerates webhook redelivery: a replayed event finds the
//! order already paid and exits without mutating anything or resending
//! email.

use chrono::Utc;
use tracing::{info, warn};

use order_core::{
    effects, BlobStore, Delivery, EmailAttachment, EmailSender, Order, OrderId, OrderStore,
    PaymentStatus, PdfKind, RecordSession, RecordStore, ReportKind,
};

use crate::emails::{customer_paid_email, fulfillment_email};
use crate::error::LifecycleError;
use crate::Lifecycle;

/// Outcome of one payment-confirmation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Unknown or not-yet-settled transaction; acknowledged and dropped.
    Ignored,
    /// The order was already paid; nothing was mutated.
    AlreadyPaid,
    /// The order was marked paid. `invoiced` tells whether the invoice
    /// turned up within the retry budget; when false, reconciliation
    /// finishes the job later.
    Paid { invoiced: bool },
}

impl<R, O, B, M> Lifecycle<R, O, B, M>
where
    R: RecordStore,
    O: OrderStore,
    B: BlobStore,
    M: EmailSender,
{
    /// Confirm a payment given an already-authenticated payment-intent id.
    pub async fn confirm_payment(&self, intent_id: &str) -> Result<PaymentOutcome, LifecycleError> {
        let session = self.records.connect().await?;

        // 1. Resolve the transaction; anything not settled is ignored.
        let Some(transaction) = session.find_payment_transaction(intent_id).await? else {
            info!(intent = %intent_id, "no transaction for intent, ignoring");
            return Ok(PaymentOutcome::Ignored);
        };
        if transaction.state != "done" {
            info!(intent = %intent_id, state = %transaction.state, "transaction not settled, ignoring");
            return Ok(PaymentOutcome::Ignored);
        }
        let Some(quotation_id) = transaction.sale_order_ids.first().copied() else {
            warn!(intent = %intent_id, "settled transaction without sale order");
            return Ok(PaymentOutcome::Ignored);
        };

        // 2. Resolve the platform order.
        let Some(count) = session.platform_count(quotation_id).await? else {
            warn!(quotation_id, "sale order carries no platform count");
            return Ok(PaymentOutcome::Ignored);
        };
        let Some((order_id, mut order)) = self.orders.find_by_count(count).await? else {
            warn!(count, quotation_id, "no order document for count");
            return Ok(PaymentOutcome::Ignored);
        };

        // 3. Replays stop here.
        if order.payment_status == PaymentStatus::Paid {
            info!(count, "order already paid, nothing to do");
            return Ok(PaymentOutcome::AlreadyPaid);
        }

        // 4. Mark paid.
        let paid_at = Utc::now();
        self.orders.mark_paid(&order_id, paid_at).await?;
        order.payment_status = PaymentStatus::Paid;
        order.paid_at = Some(paid_at);
        info!(count, quotation_id, "order marked paid");

        // 5. Wait for the sale order to reach its final state.
        let session_ref = &session;
        let confirmed = self
            .config
            .order_confirm_retry
            .run(|attempt| async move {
                match session_ref.quotation_state(quotation_id).await {
                    Ok(state) if state == "sale" => Some(()),
                    Ok(state) => {
                        info!(quotation_id, attempt, %state, "sale order not confirmed yet");
                        None
                    }
                    Err(e) => {
                        warn!(quotation_id, attempt, error = %e, "state check failed");
                        None
                    }
                }
            })
            .await
            .is_some();
        if !confirmed {
            warn!(quotation_id, "sale order never confirmed, deferring to reconciliation");
            return Ok(PaymentOutcome::Paid { invoiced: false });
        }

        // 6. Poll for the posted invoice within its budget.
        let Some(invoice_id) = self
            .config
            .invoice_retry
            .run(|attempt| async move {
                match session_ref.find_posted_invoice(quotation_id).await {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(quotation_id, attempt, error = %e, "invoice lookup failed");
                        None
                    }
                }
            })
            .await
        else {
            info!(quotation_id, "no invoice yet, deferring to reconciliation");
            return Ok(PaymentOutcome::Paid { invoiced: false });
        };
        info!(quotation_id, invoice_id, "posted invoice found");

        // 7. Documents, delivery record, notifications. All best-effort.
        self.finalize_paid_order(&session, &order_id, &mut order, invoice_id)
            .await;

        Ok(PaymentOutcome::Paid { invoiced: true })
    }

    /// Post-invoice side effects. Each failure is logged and swallowed so
    /// none of them blocks the others.
    async fn finalize_paid_order(
        &self,
        session: &R::Session,
        order_id: &OrderId,
        order: &mut Order,
        invoice_id: i64,
    ) {
        let count = order.platform_count;
        let quotation_id = order.quotation_id;

        let invoice_pdf = self
            .ensure_pdf(
                session,
                order_id,
                order,
                PdfKind::Invoice,
                ReportKind::Invoice,
                invoice_id,
            )
            .await
            .map_err(|e| warn!(count, error = %e, "invoice PDF failed"))
            .ok();

        let signed_quote_pdf = self
            .ensure_pdf(
                session,
                order_id,
                order,
                PdfKind::DevisSigned,
                ReportKind::Quotation,
                quotation_id,
            )
            .await
            .map_err(|e| warn!(count, error = %e, "signed quote PDF failed"))
            .ok();

        if let Err(e) = self
            .ensure_pdf(
                session,
                order_id,
                order,
                PdfKind::SupplierDeliveryNote,
                ReportKind::DeliveryNote,
                quotation_id,
            )
            .await
        {
            warn!(count, error = %e, "delivery note PDF failed");
        }

        if order.delivery.is_none() {
            let delivery = Delivery::new(Utc::now());
            match self.orders.set_delivery(order_id, &delivery).await {
                Ok(()) => order.delivery = Some(delivery),
                Err(e) => warn!(count, error = %e, "delivery initialization failed"),
            }
        }

        if !order.effect_done(effects::EMAIL_FULFILLMENT) {
            let email = fulfillment_email(&self.config.fulfillment_email, order);
            self.send_effect_email(order_id, order, effects::EMAIL_FULFILLMENT, &email)
                .await;
        }

        if !order.effect_done(effects::EMAIL_CUSTOMER_PAID) {
            let mut attachments = Vec::new();
            if let Some(bytes) = signed_quote_pdf {
                attachments.push(EmailAttachment::pdf(
                    format!("devis-signe-{}.pdf", count),
                    bytes,
                ));
            }
            if let Some(bytes) = invoice_pdf {
                attachments.push(EmailAttachment::pdf(
                    format!("facture-{}.pdf", count),
                    bytes,
                ));
            }
            // Fixed legal documents, fetched one by one; a missing document
            // drops that attachment only.
            for legal in &self.config.legal_attachments {
                match self.blobs.fetch(&legal.storage_path).await {
                    Ok(bytes) => {
                        attachments.push(EmailAttachment::pdf(legal.filename.clone(), bytes))
                    }
                    Err(e) => {
                        warn!(path = %legal.storage_path, error = %e, "legal attachment missing")
                    }
                }
            }
            let email = customer_paid_email(order, attachments);
            self.send_effect_email(order_id, order, effects::EMAIL_CUSTOMER_PAID, &email)
                .await;
        }
    }

    /// Send an email and record its effect on success.
    pub(crate) async fn send_effect_email(
        &self,
        order_id: &OrderId,
        order: &mut Order,
        effect: &str,
        email: &order_core::OutboundEmail,
    ) {
        match self.mailer.send(email).await {
            Ok(()) => {
                if let Err(e) = self.orders.mark_effect(order_id, effect).await {
                    warn!(count = order.platform_count, effect, error = %e, "failed to record effect");
                }
                order.effects.insert(effect.to_string());
            }
            Err(e) => {
                warn!(count = order.platform_count, effect, error = %e, "email failed");
            }
        }
    }
}
