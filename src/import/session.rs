//! Upload, review and confirm, as a state machine.
//!
//! Each step consumes the previous state, so a confirmed import cannot be
//! edited and an unreviewed document cannot be executed.
//!
//! ```
//! use nfe_import::core::*;
//! use nfe_import::import::{UploadedDocument, ImportPipeline, MemoryStore};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let invoice = ImportedInvoiceBuilder::new("7", NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
//!     .counterparty(CounterpartyBuilder::new("12345678000190", "Acme Corp").build())
//!     .add_line(LineItemBuilder::new(1, "P1", "Parafuso", dec!(10), "UN", dec!(5)).build())
//!     .add_line(LineItemBuilder::new(2, "P2", "Frete", dec!(1), "UN", dec!(20)).build())
//!     .build();
//!
//! let mut store = MemoryStore::new();
//! let mut review = UploadedDocument::new(invoice).review(&store.catalog());
//! review.set_action(2, LineItemAction::Skip).unwrap();
//!
//! let confirmed = review.confirm().unwrap();
//! let outcome = ImportPipeline::default().run(&mut store, confirmed.plan()).unwrap();
//! assert_eq!(outcome.report().lines.len(), 2);
//! assert_eq!(store.stock_movements().len(), 1);
//! ```

use thiserror::Error;

use super::pipeline::ImportPlan;
use crate::catalog::LineItemResolution;
use crate::core::{
    CatalogProduct, ImportError, ImportedInvoice, LineItemAction, ProductId, ValidationError,
};

/// A parsed document waiting for review.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    invoice: ImportedInvoice,
}

impl UploadedDocument {
    pub fn new(invoice: ImportedInvoice) -> Self {
        Self { invoice }
    }

    /// Parse an NF-e XML document.
    #[cfg(feature = "nfe")]
    pub fn from_xml(xml: &str) -> Result<Self, ImportError> {
        Ok(Self::new(crate::nfe::from_nfe_xml(xml)?))
    }

    pub fn invoice(&self) -> &ImportedInvoice {
        &self.invoice
    }

    /// Resolve every line against a catalog snapshot.
    pub fn review(self, catalog: &[CatalogProduct]) -> ReviewedImport {
        ReviewedImport {
            plan: ImportPlan::resolve(self.invoice, catalog),
        }
    }
}

/// A resolved document whose per-line actions can still change.
#[derive(Debug, Clone)]
pub struct ReviewedImport {
    plan: ImportPlan,
}

impl ReviewedImport {
    pub fn invoice(&self) -> &ImportedInvoice {
        &self.plan.invoice
    }

    pub fn resolutions(&self) -> &[LineItemResolution] {
        &self.plan.resolutions
    }

    pub fn action(&self, line: u32) -> LineItemAction {
        self.plan.action(line)
    }

    pub fn set_action(&mut self, line: u32, action: LineItemAction) -> Result<(), ImportError> {
        self.plan.set_action(line, action)
    }

    /// Bind `line` to `product` instead of its resolved match.
    pub fn link(&mut self, line: u32, product: ProductId) -> Result<(), ImportError> {
        self.set_action(line, LineItemAction::Link(Some(product)))
    }

    /// Problems that would make [`confirm`](Self::confirm) fail.
    pub fn problems(&self) -> Vec<ValidationError> {
        self.plan.validation_errors()
    }

    /// Run the validation gate. On failure the review is handed back unchanged.
    pub fn confirm(self) -> Result<ConfirmedImport, RejectedReview> {
        match self.plan.validate() {
            Ok(()) => Ok(ConfirmedImport { plan: self.plan }),
            Err(error) => Err(RejectedReview {
                review: self,
                error,
            }),
        }
    }

    /// Go back to the upload step, dropping resolutions and actions.
    pub fn back(self) -> UploadedDocument {
        UploadedDocument::new(self.plan.invoice)
    }
}

/// A review that did not pass validation.
#[derive(Debug, Error)]
#[error("review rejected: {error}")]
pub struct RejectedReview {
    pub review: ReviewedImport,
    #[source]
    pub error: ImportError,
}

/// A validated plan, ready for [`ImportPipeline::run`](super::ImportPipeline::run).
#[derive(Debug, Clone)]
pub struct ConfirmedImport {
    plan: ImportPlan,
}

impl ConfirmedImport {
    pub fn plan(&self) -> &ImportPlan {
        &self.plan
    }

    pub fn into_plan(self) -> ImportPlan {
        self.plan
    }
}
