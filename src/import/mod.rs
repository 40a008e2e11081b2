//! Import decision pipeline.
//!
//! Takes a reviewed document and applies it to a store: supplier, header,
//! catalog products, stock movements, invoice lines, then optionally the
//! ledger and a payable. The store is reached only through [`ImportStore`];
//! [`MemoryStore`] is an in-process implementation.
//!
//! Store calls commit one at a time. A failure stops the run and leaves the
//! header and every line applied before it in place; the error names the
//! step and line that failed. An ambiguous ledger match suspends the run
//! with [`ImportOutcome::AwaitingReconciliation`], to be finished with
//! [`ImportPipeline::resume`].

mod memory;
mod options;
mod pipeline;
mod session;
mod store;

pub use memory::{MemoryStore, StoreOp, StoredHeader, StoredPayable, StoredSupplier};
pub use options::{ImportOptions, ImportOptionsBuilder};
pub use pipeline::{
    AppliedAction, ImportOutcome, ImportPipeline, ImportPlan, ImportReport, LedgerOutcome,
    LineReport, PendingReconciliation, ReconciliationChoice, SupplierOutcome,
};
pub use session::{ConfirmedImport, RejectedReview, ReviewedImport, UploadedDocument};
pub use store::{
    ImportStore, InboundMovement, InvoiceLineRecord, LedgerReconciliation, LineOutcome,
    NewInvoiceHeader, NewLedgerEntry, NewPayable, NewSupplier,
};
