use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{CostUpdate, NewProduct};
use crate::core::{
    Address, CatalogProduct, HeaderId, InvoiceTotals, LedgerEntry, LedgerEntryId, PayableId,
    PaymentMethod, ProductId, StoreError, SupplierId,
};

/// Intent to register a supplier seen for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    /// Digits only.
    pub tax_id: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub state_registration: Option<String>,
    pub address: Address,
}

/// Intent to persist the header of an imported document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoiceHeader {
    pub access_key: Option<String>,
    pub number: String,
    pub series: String,
    pub issue_date: NaiveDate,
    pub supplier: SupplierId,
    pub nature_of_operation: Option<String>,
    pub totals: InvoiceTotals,
    pub payment_method: PaymentMethod,
}

/// Inbound stock movement caused by a purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMovement {
    pub product: ProductId,
    pub header: HeaderId,
    pub line_number: u32,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub total: Decimal,
}

/// How an invoice line ended up in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineOutcome {
    Created,
    Existing,
    Skipped,
}

/// Persisted record of one document line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineRecord {
    pub header: HeaderId,
    pub line_number: u32,
    pub code: String,
    pub description: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub total: Decimal,
    /// `None` for skipped lines.
    pub product: Option<ProductId>,
    pub outcome: LineOutcome,
}

/// Intent to create a ledger entry backed by an imported document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
    pub counterparty: Option<SupplierId>,
    pub document: HeaderId,
}

/// Intent to mark an existing entry as paid by an imported document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReconciliation {
    pub entry: LedgerEntryId,
    pub document: HeaderId,
    /// Replaces the entry's free-text description.
    pub description: String,
}

/// Intent to create an accounts-payable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayable {
    pub supplier: SupplierId,
    pub document: HeaderId,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub description: String,
}

/// Persistence seam of the import pipeline.
///
/// Every call is a committed write or a fresh read; the pipeline never
/// assumes a transaction spans more than one call. Implementations must
/// reject a second header with the same access key with
/// [`StoreError::UniqueViolation`], and must only change stock through
/// [`record_stock_movement`](ImportStore::record_stock_movement).
pub trait ImportStore {
    fn header_exists(&self, access_key: &str) -> Result<bool, StoreError>;

    /// Look a supplier up by digits-only tax id.
    fn find_supplier_by_tax_id(&self, tax_id: &str) -> Result<Option<SupplierId>, StoreError>;

    fn create_supplier(&mut self, supplier: NewSupplier) -> Result<SupplierId, StoreError>;

    fn insert_header(&mut self, header: NewInvoiceHeader) -> Result<HeaderId, StoreError>;

    /// Set the reconciliation back-reference of a header.
    fn set_header_ledger_entry(
        &mut self,
        header: HeaderId,
        entry: LedgerEntryId,
    ) -> Result<(), StoreError>;

    /// The ledger entry a header is already backed by, if any.
    fn header_ledger_entry(&self, header: HeaderId) -> Result<Option<LedgerEntryId>, StoreError>;

    fn product(&self, id: ProductId) -> Result<Option<CatalogProduct>, StoreError>;

    fn create_product(&mut self, product: NewProduct) -> Result<ProductId, StoreError>;

    fn update_product_cost(&mut self, update: CostUpdate) -> Result<(), StoreError>;

    /// Record the movement and raise the product's stock by its quantity.
    fn record_stock_movement(&mut self, movement: InboundMovement) -> Result<(), StoreError>;

    fn insert_invoice_line(&mut self, line: InvoiceLineRecord) -> Result<(), StoreError>;

    fn unreconciled_ledger_entries(&self) -> Result<Vec<LedgerEntry>, StoreError>;

    fn create_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntryId, StoreError>;

    fn reconcile_ledger_entry(
        &mut self,
        reconciliation: LedgerReconciliation,
    ) -> Result<(), StoreError>;

    fn create_payable(&mut self, payable: NewPayable) -> Result<PayableId, StoreError>;
}
