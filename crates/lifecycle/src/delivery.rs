//! Delivery progression driven by QR scans.

use chrono::Utc;
use tracing::{info, warn};

use order_core::{
    effects, BlobStore, DeliveryStatus, EmailSender, OrderStore, RecordStore,
};

use crate::emails::{received_email, shipped_email};
use crate::error::LifecycleError;
use crate::Lifecycle;

/// Outcome of one scan, rendered by the API layer as an HTML page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No order carries this count.
    NotFound,
    /// The order exists but has no delivery record yet (not paid/invoiced).
    NotReady,
    /// The delivery already reached `received`; nothing was mutated.
    AlreadyProcessed,
    /// The delivery moved to `shipped`.
    Shipped,
    /// The delivery moved to `received`.
    Received,
}

impl<R, O, B, M> Lifecycle<R, O, B, M>
where
    R: RecordStore,
    O: OrderStore,
    B: BlobStore,
    M: EmailSender,
{
    /// Advance the delivery state machine by one step for the given count.
    ///
    /// `pending -> shipped -> received`, forward only. The notification
    /// email for each transition is sent at most once; a failed send is
    /// logged, the effect is recorded anyway, and the send is not retried.
    pub async fn record_scan(&self, count: i64) -> Result<ScanOutcome, LifecycleError> {
        let Some((order_id, order)) = self.orders.find_by_count(count).await? else {
            return Ok(ScanOutcome::NotFound);
        };
        let Some(delivery) = order.delivery.clone() else {
            info!(count, "scan on order without delivery record");
            return Ok(ScanOutcome::NotReady);
        };

        let Some(next) = delivery.status.next() else {
            info!(count, "scan on already received delivery");
            return Ok(ScanOutcome::AlreadyProcessed);
        };

        let now = Utc::now();
        self.orders.set_delivery_status(&order_id, next, now).await?;
        info!(count, from = %delivery.status, to = %next, "delivery advanced");

        let (effect, email, outcome) = match next {
            DeliveryStatus::Shipped => (
                effects::EMAIL_SHIPPED,
                shipped_email(&order),
                ScanOutcome::Shipped,
            ),
            DeliveryStatus::Received => (
                effects::EMAIL_RECEIVED,
                received_email(&order),
                ScanOutcome::Received,
            ),
            DeliveryStatus::Pending => return Ok(ScanOutcome::NotReady),
        };

        if !order.effect_done(effect) {
            if let Err(e) = self.mailer.send(&email).await {
                warn!(count, effect, error = %e, "scan notification email failed");
            }
            // Recorded after the attempt either way: the send is never retried.
            if let Err(e) = self.orders.mark_effect(&order_id, effect).await {
                warn!(count, effect, error = %e, "failed to record effect");
            }
        }

        Ok(outcome)
    }
}
