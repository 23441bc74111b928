//! In-memory fakes of the four platform adapters.
//!
//! Used by the lifecycle integration tests: everything is scriptable and
//! every mutation is recorded, so tests can assert on both outcomes and
//! the side effects that produced them.

mod blobs;
mod mailer;
mod orders;
mod records;

pub use blobs::MockBlobStore;
pub use mailer::RecordingMailer;
pub use orders::MockOrderStore;
pub use records::{MockRecords, MockSession};
