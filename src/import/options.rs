use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::MatcherConfig;

/// Pipeline-level switches for one import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Record an inbound stock movement for every non-skipped line.
    pub apply_to_stock: bool,
    /// Reconcile against, or create, a ledger entry for the grand total.
    pub apply_to_ledger: bool,
    /// Recompute sale prices of updated products from their margin.
    pub recompute_sale_price: bool,
    /// Create a payable when the payment method is deferred.
    pub generate_payable: bool,
    /// Due date for the payable; overrides the document's installments.
    pub payable_due_date: Option<NaiveDate>,
    /// Days after the issue date a payable falls due when nothing else says so.
    pub default_payment_term_days: i64,
    /// Margin given to products created by the import.
    pub default_margin_percent: Option<Decimal>,
    pub matcher: MatcherConfig,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            apply_to_stock: true,
            apply_to_ledger: false,
            recompute_sale_price: true,
            generate_payable: false,
            payable_due_date: None,
            default_payment_term_days: 30,
            default_margin_percent: None,
            matcher: MatcherConfig::default(),
        }
    }
}

/// Builder for [`ImportOptions`].
///
/// # Example
///
/// ```
/// use nfe_import::import::ImportOptionsBuilder;
///
/// let options = ImportOptionsBuilder::new()
///     .apply_to_ledger(true)
///     .generate_payable(true)
///     .build();
/// assert!(options.apply_to_stock);
/// assert!(options.apply_to_ledger);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ImportOptionsBuilder {
    options: ImportOptions,
}

impl ImportOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_to_stock(mut self, enabled: bool) -> Self {
        self.options.apply_to_stock = enabled;
        self
    }

    pub fn apply_to_ledger(mut self, enabled: bool) -> Self {
        self.options.apply_to_ledger = enabled;
        self
    }

    pub fn recompute_sale_price(mut self, enabled: bool) -> Self {
        self.options.recompute_sale_price = enabled;
        self
    }

    pub fn generate_payable(mut self, enabled: bool) -> Self {
        self.options.generate_payable = enabled;
        self
    }

    pub fn payable_due_date(mut self, date: NaiveDate) -> Self {
        self.options.payable_due_date = Some(date);
        self
    }

    pub fn default_payment_term_days(mut self, days: i64) -> Self {
        self.options.default_payment_term_days = days;
        self
    }

    pub fn default_margin_percent(mut self, margin: Decimal) -> Self {
        self.options.default_margin_percent = Some(margin);
        self
    }

    pub fn matcher(mut self, config: MatcherConfig) -> Self {
        self.options.matcher = config;
        self
    }

    pub fn build(self) -> ImportOptions {
        self.options
    }
}
