use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::store::{
    ImportStore, InboundMovement, InvoiceLineRecord, LedgerReconciliation, NewInvoiceHeader,
    NewLedgerEntry, NewPayable, NewSupplier,
};
use crate::catalog::{CostUpdate, NewProduct};
use crate::core::{
    CatalogProduct, HeaderId, LedgerEntry, LedgerEntryId, PayableId, ProductId, StoreError,
    SupplierId, normalize_tax_id,
};

/// Store operations that can be made to fail in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreOp {
    CreateSupplier,
    InsertHeader,
    CreateProduct,
    UpdateProduct,
    StockMovement,
    InvoiceLine,
    CreateLedgerEntry,
    ReconcileLedgerEntry,
    CreatePayable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSupplier {
    pub id: SupplierId,
    pub supplier: NewSupplier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHeader {
    pub id: HeaderId,
    pub header: NewInvoiceHeader,
    /// Reconciliation back-reference.
    pub ledger_entry: Option<LedgerEntryId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPayable {
    pub id: PayableId,
    pub payable: NewPayable,
}

/// In-process [`ImportStore`], for tests, demos and single-shot tools.
///
/// Enforces the access-key uniqueness constraint and only changes stock
/// through recorded movements.
///
/// ```
/// use nfe_import::import::{MemoryStore, StoreOp};
/// use nfe_import::core::ProductBuilder;
///
/// let mut store = MemoryStore::new();
/// store.add_product(ProductBuilder::new(1, "Parafuso").code("P1").build());
/// store.fail_after(StoreOp::StockMovement, 0);
/// assert_eq!(store.catalog().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    next_id: u64,
    suppliers: Vec<StoredSupplier>,
    headers: BTreeMap<HeaderId, StoredHeader>,
    products: BTreeMap<ProductId, CatalogProduct>,
    movements: Vec<InboundMovement>,
    lines: Vec<InvoiceLineRecord>,
    ledger: BTreeMap<LedgerEntryId, LedgerEntry>,
    payables: Vec<StoredPayable>,
    faults: HashMap<StoreOp, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product. Its id must not collide with generated ids.
    pub fn add_product(&mut self, product: CatalogProduct) {
        self.bump_past(product.id.0);
        self.products.insert(product.id, product);
    }

    /// Seed a ledger entry, e.g. a bank statement line.
    pub fn add_ledger_entry(&mut self, entry: LedgerEntry) {
        self.bump_past(entry.id.0);
        self.ledger.insert(entry.id, entry);
    }

    pub fn add_supplier(&mut self, supplier: NewSupplier) -> SupplierId {
        let id = SupplierId(self.allocate());
        self.suppliers.push(StoredSupplier { id, supplier });
        id
    }

    /// Let `op` succeed `successes` more times, then fail once with
    /// [`StoreError::Rejected`].
    pub fn fail_after(&mut self, op: StoreOp, successes: usize) {
        self.faults.insert(op, successes);
    }

    /// Catalog snapshot, ordered by id.
    pub fn catalog(&self) -> Vec<CatalogProduct> {
        self.products.values().cloned().collect()
    }

    pub fn products(&self) -> impl Iterator<Item = &CatalogProduct> {
        self.products.values()
    }

    pub fn get_product(&self, id: ProductId) -> Option<&CatalogProduct> {
        self.products.get(&id)
    }

    pub fn suppliers(&self) -> &[StoredSupplier] {
        &self.suppliers
    }

    pub fn headers(&self) -> impl Iterator<Item = &StoredHeader> {
        self.headers.values()
    }

    pub fn header(&self, id: HeaderId) -> Option<&StoredHeader> {
        self.headers.get(&id)
    }

    pub fn stock_movements(&self) -> &[InboundMovement] {
        &self.movements
    }

    pub fn invoice_lines(&self) -> &[InvoiceLineRecord] {
        &self.lines
    }

    pub fn ledger_entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.ledger.values()
    }

    pub fn ledger_entry(&self, id: LedgerEntryId) -> Option<&LedgerEntry> {
        self.ledger.get(&id)
    }

    pub fn payables(&self) -> &[StoredPayable] {
        &self.payables
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn bump_past(&mut self, id: u64) {
        self.next_id = self.next_id.max(id);
    }

    fn check(&mut self, op: StoreOp) -> Result<(), StoreError> {
        let Some(remaining) = self.faults.get_mut(&op) else {
            return Ok(());
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(());
        }
        self.faults.remove(&op);
        Err(StoreError::Rejected(format!("injected failure on {op:?}")))
    }

    fn product_mut(&mut self, id: ProductId) -> Result<&mut CatalogProduct, StoreError> {
        self.products.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "product",
            id: id.to_string(),
        })
    }

    fn ledger_mut(&mut self, id: LedgerEntryId) -> Result<&mut LedgerEntry, StoreError> {
        self.ledger.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "ledger entry",
            id: id.to_string(),
        })
    }
}

impl ImportStore for MemoryStore {
    fn header_exists(&self, access_key: &str) -> Result<bool, StoreError> {
        Ok(self
            .headers
            .values()
            .any(|h| h.header.access_key.as_deref() == Some(access_key)))
    }

    fn find_supplier_by_tax_id(&self, tax_id: &str) -> Result<Option<SupplierId>, StoreError> {
        let tax_id = normalize_tax_id(tax_id);
        Ok(self
            .suppliers
            .iter()
            .find(|s| normalize_tax_id(&s.supplier.tax_id) == tax_id)
            .map(|s| s.id))
    }

    fn create_supplier(&mut self, supplier: NewSupplier) -> Result<SupplierId, StoreError> {
        self.check(StoreOp::CreateSupplier)?;
        Ok(self.add_supplier(supplier))
    }

    fn insert_header(&mut self, header: NewInvoiceHeader) -> Result<HeaderId, StoreError> {
        self.check(StoreOp::InsertHeader)?;
        if let Some(key) = header.access_key.as_deref() {
            if self.header_exists(key)? {
                return Err(StoreError::UniqueViolation {
                    constraint: "invoice_header_access_key".into(),
                    value: key.to_string(),
                });
            }
        }
        let id = HeaderId(self.allocate());
        self.headers.insert(
            id,
            StoredHeader {
                id,
                header,
                ledger_entry: None,
            },
        );
        Ok(id)
    }

    fn set_header_ledger_entry(
        &mut self,
        header: HeaderId,
        entry: LedgerEntryId,
    ) -> Result<(), StoreError> {
        let stored = self.headers.get_mut(&header).ok_or(StoreError::NotFound {
            entity: "invoice header",
            id: header.to_string(),
        })?;
        stored.ledger_entry = Some(entry);
        Ok(())
    }

    fn header_ledger_entry(&self, header: HeaderId) -> Result<Option<LedgerEntryId>, StoreError> {
        self.headers
            .get(&header)
            .map(|stored| stored.ledger_entry)
            .ok_or(StoreError::NotFound {
                entity: "invoice header",
                id: header.to_string(),
            })
    }

    fn product(&self, id: ProductId) -> Result<Option<CatalogProduct>, StoreError> {
        Ok(self.products.get(&id).cloned())
    }

    fn create_product(&mut self, product: NewProduct) -> Result<ProductId, StoreError> {
        self.check(StoreOp::CreateProduct)?;
        let id = ProductId(self.allocate());
        self.products.insert(
            id,
            CatalogProduct {
                id,
                code: product.code,
                name: product.name,
                barcode: product.barcode,
                unit: product.unit,
                last_purchase_cost: product.cost,
                average_cost: product.cost,
                sale_price: product.sale_price,
                margin_percent: product.margin_percent,
                stock_quantity: Default::default(),
            },
        );
        Ok(id)
    }

    fn update_product_cost(&mut self, update: CostUpdate) -> Result<(), StoreError> {
        self.check(StoreOp::UpdateProduct)?;
        let product = self.product_mut(update.product)?;
        product.last_purchase_cost = update.last_purchase_cost;
        product.average_cost = update.average_cost;
        if let Some(price) = update.sale_price {
            product.sale_price = price;
        }
        Ok(())
    }

    fn record_stock_movement(&mut self, movement: InboundMovement) -> Result<(), StoreError> {
        self.check(StoreOp::StockMovement)?;
        let product = self.product_mut(movement.product)?;
        product.stock_quantity += movement.quantity;
        self.movements.push(movement);
        Ok(())
    }

    fn insert_invoice_line(&mut self, line: InvoiceLineRecord) -> Result<(), StoreError> {
        self.check(StoreOp::InvoiceLine)?;
        self.lines.push(line);
        Ok(())
    }

    fn unreconciled_ledger_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .ledger
            .values()
            .filter(|e| !e.reconciled)
            .cloned()
            .collect())
    }

    fn create_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntryId, StoreError> {
        self.check(StoreOp::CreateLedgerEntry)?;
        let id = LedgerEntryId(self.allocate());
        self.ledger.insert(
            id,
            LedgerEntry {
                id,
                amount: entry.amount,
                date: entry.date,
                description: entry.description,
                counterparty: entry.counterparty,
                has_source_document: true,
                reconciled: false,
                statement_ref: None,
                document: Some(entry.document),
            },
        );
        Ok(id)
    }

    fn reconcile_ledger_entry(
        &mut self,
        reconciliation: LedgerReconciliation,
    ) -> Result<(), StoreError> {
        self.check(StoreOp::ReconcileLedgerEntry)?;
        let entry = self.ledger_mut(reconciliation.entry)?;
        entry.reconciled = true;
        entry.has_source_document = true;
        entry.description = reconciliation.description;
        entry.document = Some(reconciliation.document);
        Ok(())
    }

    fn create_payable(&mut self, payable: NewPayable) -> Result<PayableId, StoreError> {
        self.check(StoreOp::CreatePayable)?;
        let id = PayableId(self.allocate());
        self.payables.push(StoredPayable { id, payable });
        Ok(id)
    }
}
