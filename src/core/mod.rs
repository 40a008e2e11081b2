//! Core import types, errors, unit normalization and builders.
//!
//! Every other module works on these records: the parsed invoice with its
//! lines, catalog products, ledger entries and the per-line action picked
//! during review.

mod builder;
mod error;
mod types;
pub mod units;

pub use builder::*;
pub use error::*;
pub use types::*;
pub use units::normalize_unit;
