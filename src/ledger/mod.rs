//! Ledger reconciliation: deciding whether an existing cash-flow entry *is*
//! the payment of an imported invoice.
//!
//! Each unreconciled entry gets a composite score from amount agreement
//! (dominant), date proximity and description similarity. The matcher then
//! reports a single confident match, a ranked list for a human to choose
//! from, or nothing. It never mutates the entries it is given.
//!
//! ```
//! use chrono::NaiveDate;
//! use nfe_import::core::LedgerEntryBuilder;
//! use nfe_import::ledger::*;
//! use rust_decimal_macros::dec;
//!
//! let issued = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
//! let entries = vec![
//!     LedgerEntryBuilder::new(1, dec!(1200.00), issued.succ_opt().unwrap())
//!         .description("payment to Acme Corp")
//!         .build(),
//! ];
//! let query = ReconciliationQuery {
//!     amount: dec!(1200.00),
//!     issue_date: issued,
//!     label: "NF-e 123/1 - Acme Corp".into(),
//!     counterparty_name: "Acme Corp".into(),
//! };
//! let result = find_matches(&query, &entries, &MatcherConfig::default());
//! assert!(matches!(result, ReconciliationMatch::Confident(_)));
//! ```

mod config;
mod matcher;
pub mod similarity;

pub use config::{MatcherConfig, MatcherConfigBuilder};
pub use matcher::{
    ReconciliationCandidate, ReconciliationMatch, ReconciliationQuery, find_matches, score_entry,
};
