//! Reconciliation sweep: orders stuck in pending states are checked
//! against the record store's invoice payment state.

use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use order_core::{
    BlobStore, EmailSender, InvoicePaymentState, OrderStore, RecordSession, RecordStore,
};

use crate::error::LifecycleError;
use crate::Lifecycle;

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Orders found in pending states.
    pub pending: usize,
    /// Orders whose invoice state was checked.
    pub checked: usize,
    /// Orders transitioned to paid.
    pub updated: usize,
    /// Per-order failures (the sweep continues past them).
    pub errors: usize,
    pub duration_ms: u64,
}

impl<R, O, B, M> Lifecycle<R, O, B, M>
where
    R: RecordStore,
    O: OrderStore,
    B: BlobStore,
    M: EmailSender,
{
    /// Sweep all pending orders once, marking paid the ones whose invoice
    /// is settled in the record store.
    pub async fn reconcile_pending(&self) -> Result<ReconcileSummary, LifecycleError> {
        let started = Instant::now();
        let pending = self.orders.list_pending_payment().await?;
        let mut summary = ReconcileSummary {
            pending: pending.len(),
            ..Default::default()
        };

        let session = self.records.connect().await?;
        for (order_id, order) in pending {
            let count = order.platform_count;
            match session.invoice_payment_state(order.quotation_id).await {
                Ok(InvoicePaymentState::NoInvoice) => {
                    summary.checked += 1;
                }
                Ok(InvoicePaymentState::State(state)) if state == "paid" => {
                    summary.checked += 1;
                    match self.orders.mark_paid(&order_id, Utc::now()).await {
                        Ok(()) => {
                            info!(count, "reconciliation marked order paid");
                            summary.updated += 1;
                        }
                        Err(e) => {
                            warn!(count, error = %e, "reconciliation mark-paid failed");
                            summary.errors += 1;
                        }
                    }
                }
                Ok(InvoicePaymentState::State(_)) => {
                    summary.checked += 1;
                }
                Err(e) => {
                    warn!(count, error = %e, "invoice state check failed");
                    summary.errors += 1;
                }
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            pending = summary.pending,
            updated = summary.updated,
            errors = summary.errors,
            "reconciliation sweep finished"
        );
        Ok(summary)
    }
}
