//! # nfe-import
//!
//! Supplier invoice import for small-business back offices: reads an NF-e
//! XML document, resolves its lines against the product catalog, applies
//! the purchase to catalog, stock and invoice records, and reconciles the
//! total against bank-statement ledger entries.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Only reconciliation scores are `f64`.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use nfe_import::core::*;
//! use nfe_import::import::{ImportOptionsBuilder, ImportPipeline, MemoryStore, UploadedDocument};
//! use rust_decimal_macros::dec;
//!
//! let mut store = MemoryStore::new();
//! store.add_product(
//!     ProductBuilder::new(1, "Parafuso 3mm").code("P1").cost(dec!(4)).margin_percent(dec!(20)).build(),
//! );
//!
//! let invoice = ImportedInvoiceBuilder::new("123", NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
//!     .access_key("NFe123")
//!     .counterparty(CounterpartyBuilder::new("12.345.678/0001-90", "Acme Corp").build())
//!     .add_line(LineItemBuilder::new(1, "P1", "Parafuso 3mm", dec!(10), "UN", dec!(5.00)).build())
//!     .build();
//!
//! let confirmed = UploadedDocument::new(invoice)
//!     .review(&store.catalog())
//!     .confirm()
//!     .unwrap();
//! let pipeline = ImportPipeline::new(ImportOptionsBuilder::new().build());
//! pipeline.run(&mut store, confirmed.plan()).unwrap();
//!
//! let product = store.get_product(ProductId(1)).unwrap();
//! assert_eq!(product.last_purchase_cost, dec!(5.00));
//! assert_eq!(product.sale_price, dec!(6.00));
//! assert_eq!(product.stock_quantity, dec!(10));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Types, errors, catalog resolution, ledger matcher, import pipeline |
//! | `nfe` (default) | NF-e XML parsing |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod catalog;

#[cfg(feature = "core")]
pub mod ledger;

#[cfg(feature = "core")]
pub mod import;

#[cfg(feature = "nfe")]
pub mod nfe;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
