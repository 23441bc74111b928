//! Order lifecycle orchestration.
//!
//! [`Lifecycle`] drives every operation of the platform — intake, payment
//! confirmation, delivery progression, telemetry, reconciliation, quote
//! documents — against the four collaborator traits from `order-core`. A
//! fresh record-store session is opened at the start of each operation and
//! dropped when it finishes.
//!
//! Side effects that have already been performed are skipped by consulting
//! the order's effect set, so webhook redelivery and double scans stay
//! idempotent.

mod config;
mod delivery;
mod documents;
mod emails;
mod error;
mod intake;
mod payment;
mod reconcile;
mod telemetry;

pub use config::{LegalAttachment, LifecycleConfig};
pub use delivery::ScanOutcome;
pub use documents::ArchiveOutcome;
pub use error::LifecycleError;
pub use intake::{IntakeClient, IntakeOutcome, IntakeRequest, SimulationSummary};
pub use payment::PaymentOutcome;
pub use reconcile::ReconcileSummary;

use order_core::{BlobStore, EmailSender, OrderStore, RecordStore};

/// The lifecycle orchestrator, generic over its collaborators.
pub struct Lifecycle<R, O, B, M> {
    records: R,
    orders: O,
    blobs: B,
    mailer: M,
    config: LifecycleConfig,
}

impl<R, O, B, M> Lifecycle<R, O, B, M>
where
    R: RecordStore,
    O: OrderStore,
    B: BlobStore,
    M: EmailSender,
{
    pub fn new(records: R, orders: O, blobs: B, mailer: M, config: LifecycleConfig) -> Self {
        Self {
            records,
            orders,
            blobs,
            mailer,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }
}
