//! Product resolution and purchase pricing.
//!
//! Resolution is a pure lookup over a catalog snapshot supplied by the caller;
//! nothing here touches a store. Pricing turns a resolved line into the
//! create/update intents the import pipeline hands to the store.

mod pricing;
mod resolve;

pub use pricing::{CostUpdate, NewProduct, cost_update, new_product, price_from_margin};
pub use resolve::{
    LineItemResolution, MatchKey, ProductMatch, is_usable_barcode, resolve_line, resolve_lines,
};
