use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::options::ImportOptions;
use super::store::{
    ImportStore, InboundMovement, InvoiceLineRecord, LedgerReconciliation, LineOutcome,
    NewInvoiceHeader, NewLedgerEntry, NewPayable, NewSupplier,
};
use crate::catalog::{LineItemResolution, cost_update, new_product, resolve_lines};
use crate::core::{
    CatalogProduct, Counterparty, HeaderId, ImportError, ImportStep, ImportedInvoice,
    ImportedInvoiceHeader, ImportedLineItem, LedgerEntryId, LineItemAction, PayableId, ProductId,
    StoreError, SupplierId, ValidationError, normalize_tax_id,
};
use crate::ledger::{
    ReconciliationCandidate, ReconciliationMatch, ReconciliationQuery, find_matches,
};

/// A document, its catalog resolutions and the per-line actions to apply.
///
/// Lines without an explicit action run as [`LineItemAction::Auto`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPlan {
    pub invoice: ImportedInvoice,
    pub resolutions: Vec<LineItemResolution>,
    actions: BTreeMap<u32, LineItemAction>,
}

impl ImportPlan {
    pub fn new(invoice: ImportedInvoice, resolutions: Vec<LineItemResolution>) -> Self {
        Self {
            invoice,
            resolutions,
            actions: BTreeMap::new(),
        }
    }

    /// Resolve every line of `invoice` against a catalog snapshot.
    pub fn resolve(invoice: ImportedInvoice, catalog: &[CatalogProduct]) -> Self {
        let resolutions = resolve_lines(&invoice.lines, catalog);
        Self::new(invoice, resolutions)
    }

    /// Builder-style [`set_action`](Self::set_action) for fixtures.
    pub fn with_action(mut self, line: u32, action: LineItemAction) -> Result<Self, ImportError> {
        self.set_action(line, action)?;
        Ok(self)
    }

    pub fn set_action(&mut self, line: u32, action: LineItemAction) -> Result<(), ImportError> {
        if !self.has_line(line) {
            return Err(ImportError::LineOutOfRange {
                line,
                lines: self.invoice.lines.len(),
            });
        }
        if action == LineItemAction::Auto {
            self.actions.remove(&line);
        } else {
            self.actions.insert(line, action);
        }
        Ok(())
    }

    pub fn action(&self, line: u32) -> LineItemAction {
        self.actions.get(&line).copied().unwrap_or_default()
    }

    pub fn resolution(&self, line: u32) -> Option<&LineItemResolution> {
        self.resolutions.iter().find(|r| r.line_number == line)
    }

    /// Lines set to `link` without a target, in ascending order.
    pub fn missing_link_targets(&self) -> Vec<u32> {
        self.actions
            .iter()
            .filter(|(_, action)| matches!(action, LineItemAction::Link(None)))
            .map(|(line, _)| *line)
            .collect()
    }

    /// Line numbers used by more than one line, in ascending order.
    pub fn duplicate_line_numbers(&self) -> Vec<u32> {
        let mut seen = BTreeSet::new();
        let duplicates: BTreeSet<u32> = self
            .invoice
            .lines
            .iter()
            .map(|l| l.line_number)
            .filter(|n| !seen.insert(*n))
            .collect();
        duplicates.into_iter().collect()
    }

    /// Every problem that blocks execution, as field-path errors.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for line in self.duplicate_line_numbers() {
            errors.push(ValidationError::new(
                format!("lines.{line}"),
                "line number is used more than once",
            ));
        }
        for line in self.actions.keys().filter(|l| !self.has_line(**l)) {
            errors.push(ValidationError::new(
                format!("lines.{line}"),
                "no such line in the document",
            ));
        }
        for line in self.missing_link_targets() {
            errors.push(ValidationError::new(
                format!("lines.{line}.action"),
                "link requires a target product",
            ));
        }
        errors
    }

    /// The all-or-nothing gate run before any store call.
    pub fn validate(&self) -> Result<(), ImportError> {
        if let Some(line) = self.duplicate_line_numbers().first() {
            return Err(ImportError::DuplicateLineNumber { line: *line });
        }
        if let Some(line) = self.actions.keys().find(|l| !self.has_line(**l)) {
            return Err(ImportError::LineOutOfRange {
                line: *line,
                lines: self.invoice.lines.len(),
            });
        }
        let missing = self.missing_link_targets();
        if !missing.is_empty() {
            return Err(ImportError::MissingLinkTarget { lines: missing });
        }
        Ok(())
    }

    fn has_line(&self, line: u32) -> bool {
        self.invoice.lines.iter().any(|l| l.line_number == line)
    }
}

/// Whether the supplier was found or registered by this import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierOutcome {
    Existing(SupplierId),
    Created(SupplierId),
}

impl SupplierOutcome {
    pub fn id(&self) -> SupplierId {
        match self {
            Self::Existing(id) | Self::Created(id) => *id,
        }
    }
}

/// What happened to one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppliedAction {
    Created,
    Updated,
    Linked,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReport {
    pub line_number: u32,
    pub action: AppliedAction,
    pub product: Option<ProductId>,
}

/// What happened on the ledger side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerOutcome {
    NotRequested,
    /// An existing entry was marked as paid by this document.
    Reconciled { entry: LedgerEntryId, score: f64 },
    /// A new entry backed by this document was created.
    Created { entry: LedgerEntryId },
    /// Several candidates fit; a human has to pick one.
    AwaitingChoice,
    /// The pending choice was dropped; nothing was posted.
    Abandoned,
}

/// Summary of everything an import committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub header: HeaderId,
    pub supplier: SupplierOutcome,
    pub lines: Vec<LineReport>,
    pub stock_movements: usize,
    pub ledger: LedgerOutcome,
    pub payable: Option<PayableId>,
}

impl ImportReport {
    pub fn count(&self, action: AppliedAction) -> usize {
        self.lines.iter().filter(|l| l.action == action).count()
    }
}

/// Ledger posting waiting for a human decision. Serializable so it can be
/// kept between requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReconciliation {
    pub header: HeaderId,
    pub supplier: SupplierId,
    pub query: ReconciliationQuery,
    /// Ranked best first.
    pub candidates: Vec<ReconciliationCandidate>,
}

/// The caller's answer to a [`PendingReconciliation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationChoice {
    Candidate(LedgerEntryId),
    CreateNew,
    /// Post nothing to the ledger. Earlier steps stay committed.
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportOutcome {
    Completed(ImportReport),
    AwaitingReconciliation {
        report: ImportReport,
        pending: PendingReconciliation,
    },
}

impl ImportOutcome {
    pub fn report(&self) -> &ImportReport {
        match self {
            Self::Completed(report) | Self::AwaitingReconciliation { report, .. } => report,
        }
    }

    pub fn pending(&self) -> Option<&PendingReconciliation> {
        match self {
            Self::Completed(_) => None,
            Self::AwaitingReconciliation { pending, .. } => Some(pending),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

enum LedgerStep {
    Done(LedgerOutcome),
    Suspended(Vec<ReconciliationCandidate>),
}

/// Applies an [`ImportPlan`] to a store.
///
/// Steps run in order: duplicate check, supplier, header, lines (product,
/// stock movement, invoice line), ledger, payable. Each store call commits
/// on its own. The first failure stops the run and is returned with the
/// step, the line and the header already created.
#[derive(Debug, Clone, Default)]
pub struct ImportPipeline {
    options: ImportOptions,
}

impl ImportPipeline {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn run<S: ImportStore + ?Sized>(
        &self,
        store: &mut S,
        plan: &ImportPlan,
    ) -> Result<ImportOutcome, ImportError> {
        plan.validate()?;

        let header = &plan.invoice.header;
        let access_key = header.access_key();
        info!(
            document = %header.document_label(),
            access_key = access_key.unwrap_or("-"),
            lines = plan.invoice.lines.len(),
            "starting import"
        );

        if let Some(key) = access_key {
            ensure_not_imported(store, key)?;
        }

        let supplier = resolve_supplier(store, &header.counterparty)?;

        // Checked again right before the insert; the store's unique
        // constraint is the final guard.
        if let Some(key) = access_key {
            ensure_not_imported(store, key)?;
        }
        let header_id = insert_header(store, header, supplier.id())?;
        info!(header = %header_id, supplier = %supplier.id(), "created invoice header");

        let mut report = ImportReport {
            header: header_id,
            supplier,
            lines: Vec::with_capacity(plan.invoice.lines.len()),
            stock_movements: 0,
            ledger: LedgerOutcome::NotRequested,
            payable: None,
        };

        for line in &plan.invoice.lines {
            self.process_line(store, plan, line, &mut report)?;
        }

        let ledger = if self.options.apply_to_ledger {
            self.post_ledger(store, header_id, supplier.id(), header)?
        } else {
            LedgerStep::Done(LedgerOutcome::NotRequested)
        };

        report.payable = self.post_payable(store, header_id, supplier.id(), header)?;

        match ledger {
            LedgerStep::Done(outcome) => {
                report.ledger = outcome;
                info!(
                    header = %header_id,
                    created = report.count(AppliedAction::Created),
                    updated = report.count(AppliedAction::Updated),
                    linked = report.count(AppliedAction::Linked),
                    skipped = report.count(AppliedAction::Skipped),
                    "import completed"
                );
                Ok(ImportOutcome::Completed(report))
            }
            LedgerStep::Suspended(candidates) => {
                report.ledger = LedgerOutcome::AwaitingChoice;
                warn!(
                    header = %header_id,
                    candidates = candidates.len(),
                    "ledger reconciliation is ambiguous, awaiting a choice"
                );
                let pending = PendingReconciliation {
                    header: header_id,
                    supplier: supplier.id(),
                    query: ReconciliationQuery::for_header(header),
                    candidates,
                };
                Ok(ImportOutcome::AwaitingReconciliation { report, pending })
            }
        }
    }

    /// Finish a suspended ledger posting with the caller's choice.
    ///
    /// A header that already has a ledger entry is refused with
    /// [`ImportError::AlreadyPosted`], so a pending reconciliation can only
    /// post once.
    pub fn resume<S: ImportStore + ?Sized>(
        &self,
        store: &mut S,
        pending: PendingReconciliation,
        choice: ReconciliationChoice,
    ) -> Result<LedgerOutcome, ImportError> {
        if choice != ReconciliationChoice::Abandon {
            let posted = store
                .header_ledger_entry(pending.header)
                .map_err(|e| abort(ImportStep::Ledger, None, Some(pending.header), e))?;
            if let Some(entry) = posted {
                warn!(header = %pending.header, %entry, "header already posted to the ledger");
                return Err(ImportError::AlreadyPosted {
                    header: pending.header,
                    entry,
                });
            }
        }

        match choice {
            ReconciliationChoice::Candidate(entry) => {
                let candidate = pending
                    .candidates
                    .iter()
                    .find(|c| c.entry.id == entry)
                    .ok_or(ImportError::UnknownCandidate { entry })?;
                reconcile(store, pending.header, &pending.query.label, entry)?;
                info!(header = %pending.header, %entry, "reconciled with chosen ledger entry");
                Ok(LedgerOutcome::Reconciled {
                    entry,
                    score: candidate.score,
                })
            }
            ReconciliationChoice::CreateNew => {
                let entry = create_entry(store, pending.header, pending.supplier, &pending.query)?;
                info!(header = %pending.header, %entry, "created ledger entry");
                Ok(LedgerOutcome::Created { entry })
            }
            ReconciliationChoice::Abandon => {
                info!(header = %pending.header, "ledger posting abandoned");
                Ok(LedgerOutcome::Abandoned)
            }
        }
    }

    /// Due date of the payable: configured date, first installment, or
    /// issue date plus the default term.
    pub fn payable_due_date(&self, header: &ImportedInvoiceHeader) -> NaiveDate {
        self.options
            .payable_due_date
            .or_else(|| header.first_due_date())
            .unwrap_or_else(|| {
                Duration::try_days(self.options.default_payment_term_days)
                    .and_then(|term| header.issue_date.checked_add_signed(term))
                    .unwrap_or(header.issue_date)
            })
    }

    fn process_line<S: ImportStore + ?Sized>(
        &self,
        store: &mut S,
        plan: &ImportPlan,
        line: &ImportedLineItem,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let number = line.line_number;
        let header = report.header;
        let fail = |step: ImportStep, source: StoreError| abort(step, Some(number), Some(header), source);

        let (applied, product, outcome) = match plan.action(number) {
            LineItemAction::Skip => (AppliedAction::Skipped, None, LineOutcome::Skipped),
            LineItemAction::ForceCreate => {
                let id = self
                    .create_product(store, line)
                    .map_err(|e| fail(ImportStep::CreateProduct, e))?;
                (AppliedAction::Created, Some(id), LineOutcome::Created)
            }
            LineItemAction::Auto => match plan.resolution(number).and_then(|r| r.matched.as_ref()) {
                Some(matched) => {
                    self.update_product(store, &matched.product, line)
                        .map_err(|e| fail(ImportStep::UpdateProduct, e))?;
                    (
                        AppliedAction::Updated,
                        Some(matched.product.id),
                        LineOutcome::Existing,
                    )
                }
                None => {
                    let id = self
                        .create_product(store, line)
                        .map_err(|e| fail(ImportStep::CreateProduct, e))?;
                    (AppliedAction::Created, Some(id), LineOutcome::Created)
                }
            },
            LineItemAction::Link(Some(target)) => {
                let product = store
                    .product(target)
                    .map_err(|e| fail(ImportStep::LinkProduct, e))?
                    .ok_or_else(|| {
                        fail(
                            ImportStep::LinkProduct,
                            StoreError::NotFound {
                                entity: "product",
                                id: target.to_string(),
                            },
                        )
                    })?;
                self.update_product(store, &product, line)
                    .map_err(|e| fail(ImportStep::UpdateProduct, e))?;
                (AppliedAction::Linked, Some(target), LineOutcome::Existing)
            }
            LineItemAction::Link(None) => {
                return Err(ImportError::MissingLinkTarget {
                    lines: vec![number],
                });
            }
        };
        debug!(line = number, action = ?applied, product = ?product, "applied line");

        if let Some(product) = product.filter(|_| self.options.apply_to_stock) {
            store
                .record_stock_movement(InboundMovement {
                    product,
                    header,
                    line_number: number,
                    quantity: line.quantity,
                    unit_value: line.unit_value,
                    total: line.total,
                })
                .map_err(|e| fail(ImportStep::StockMovement, e))?;
            report.stock_movements += 1;
        }

        store
            .insert_invoice_line(InvoiceLineRecord {
                header,
                line_number: number,
                code: line.code.clone(),
                description: line.description.clone(),
                unit: line.unit.clone(),
                quantity: line.quantity,
                unit_value: line.unit_value,
                total: line.total,
                product,
                outcome,
            })
            .map_err(|e| fail(ImportStep::InvoiceLine, e))?;

        report.lines.push(LineReport {
            line_number: number,
            action: applied,
            product,
        });
        Ok(())
    }

    fn create_product<S: ImportStore + ?Sized>(
        &self,
        store: &mut S,
        line: &ImportedLineItem,
    ) -> Result<ProductId, StoreError> {
        store.create_product(new_product(line, self.options.default_margin_percent))
    }

    fn update_product<S: ImportStore + ?Sized>(
        &self,
        store: &mut S,
        product: &CatalogProduct,
        line: &ImportedLineItem,
    ) -> Result<(), StoreError> {
        store.update_product_cost(cost_update(
            product,
            line.unit_value,
            self.options.recompute_sale_price,
        ))
    }

    fn post_ledger<S: ImportStore + ?Sized>(
        &self,
        store: &mut S,
        header_id: HeaderId,
        supplier: SupplierId,
        header: &ImportedInvoiceHeader,
    ) -> Result<LedgerStep, ImportError> {
        let entries = store
            .unreconciled_ledger_entries()
            .map_err(|e| abort(ImportStep::Ledger, None, Some(header_id), e))?;
        let query = ReconciliationQuery::for_header(header);

        match find_matches(&query, &entries, &self.options.matcher) {
            ReconciliationMatch::Confident(candidate) => {
                let entry = candidate.entry.id;
                reconcile(store, header_id, &query.label, entry)?;
                info!(
                    header = %header_id,
                    %entry,
                    score = candidate.score,
                    "reconciled with existing ledger entry"
                );
                Ok(LedgerStep::Done(LedgerOutcome::Reconciled {
                    entry,
                    score: candidate.score,
                }))
            }
            ReconciliationMatch::Candidates(candidates) if candidates.len() > 1 => {
                Ok(LedgerStep::Suspended(candidates))
            }
            ReconciliationMatch::Candidates(_) | ReconciliationMatch::NoMatch => {
                let entry = create_entry(store, header_id, supplier, &query)?;
                info!(header = %header_id, %entry, "created ledger entry");
                Ok(LedgerStep::Done(LedgerOutcome::Created { entry }))
            }
        }
    }

    fn post_payable<S: ImportStore + ?Sized>(
        &self,
        store: &mut S,
        header_id: HeaderId,
        supplier: SupplierId,
        header: &ImportedInvoiceHeader,
    ) -> Result<Option<PayableId>, ImportError> {
        if !self.options.generate_payable {
            return Ok(None);
        }
        if !header.payment_method.is_deferred() {
            debug!(
                method = header.payment_method.code(),
                "payment is not deferred, no payable"
            );
            return Ok(None);
        }

        let due_date = self.payable_due_date(header);
        let payable = store
            .create_payable(NewPayable {
                supplier,
                document: header_id,
                amount: header.totals.grand_total,
                due_date,
                description: header.document_label(),
            })
            .map_err(|e| abort(ImportStep::Payable, None, Some(header_id), e))?;
        info!(header = %header_id, %payable, %due_date, "created payable");
        Ok(Some(payable))
    }
}

fn abort(
    step: ImportStep,
    line: Option<u32>,
    header: Option<HeaderId>,
    source: StoreError,
) -> ImportError {
    let err = ImportError::step(step, line, header, source);
    warn!(error = %err, "import aborted");
    err
}

fn ensure_not_imported<S: ImportStore + ?Sized>(store: &S, key: &str) -> Result<(), ImportError> {
    let exists = store
        .header_exists(key)
        .map_err(|e| abort(ImportStep::DuplicateCheck, None, None, e))?;
    if exists {
        warn!(access_key = key, "document already imported");
        return Err(ImportError::DuplicateDocument {
            access_key: key.to_string(),
        });
    }
    Ok(())
}

fn resolve_supplier<S: ImportStore + ?Sized>(
    store: &mut S,
    counterparty: &Counterparty,
) -> Result<SupplierOutcome, ImportError> {
    let fail = |e| abort(ImportStep::Counterparty, None, None, e);
    let tax_id = normalize_tax_id(&counterparty.tax_id);

    if let Some(id) = store.find_supplier_by_tax_id(&tax_id).map_err(fail)? {
        debug!(supplier = %id, "found existing supplier");
        return Ok(SupplierOutcome::Existing(id));
    }

    let id = store
        .create_supplier(NewSupplier {
            tax_id: tax_id.clone(),
            legal_name: counterparty.legal_name.clone(),
            trade_name: counterparty.trade_name.clone(),
            state_registration: counterparty.state_registration.clone(),
            address: counterparty.address.clone(),
        })
        .map_err(fail)?;
    info!(supplier = %id, tax_id = %tax_id, "created supplier");
    Ok(SupplierOutcome::Created(id))
}

fn insert_header<S: ImportStore + ?Sized>(
    store: &mut S,
    header: &ImportedInvoiceHeader,
    supplier: SupplierId,
) -> Result<HeaderId, ImportError> {
    let access_key = header.access_key().map(str::to_string);
    store
        .insert_header(NewInvoiceHeader {
            access_key: access_key.clone(),
            number: header.number.clone(),
            series: header.series.clone(),
            issue_date: header.issue_date,
            supplier,
            nature_of_operation: header.nature_of_operation.clone(),
            totals: header.totals.clone(),
            payment_method: header.payment_method.clone(),
        })
        .map_err(|e| match (e, access_key) {
            (StoreError::UniqueViolation { .. }, Some(access_key)) => {
                warn!(access_key = %access_key, "document already imported");
                ImportError::DuplicateDocument { access_key }
            }
            (e, _) => abort(ImportStep::Header, None, None, e),
        })
}

fn reconcile<S: ImportStore + ?Sized>(
    store: &mut S,
    header: HeaderId,
    label: &str,
    entry: LedgerEntryId,
) -> Result<(), ImportError> {
    let fail = |e| abort(ImportStep::Ledger, None, Some(header), e);
    store
        .reconcile_ledger_entry(LedgerReconciliation {
            entry,
            document: header,
            description: label.to_string(),
        })
        .map_err(fail)?;
    store.set_header_ledger_entry(header, entry).map_err(fail)
}

fn create_entry<S: ImportStore + ?Sized>(
    store: &mut S,
    header: HeaderId,
    supplier: SupplierId,
    query: &ReconciliationQuery,
) -> Result<LedgerEntryId, ImportError> {
    let fail = |e| abort(ImportStep::Ledger, None, Some(header), e);
    let entry = store
        .create_ledger_entry(NewLedgerEntry {
            amount: query.amount,
            date: query.issue_date,
            description: query.label.clone(),
            counterparty: Some(supplier),
            document: header,
        })
        .map_err(fail)?;
    store.set_header_ledger_entry(header, entry).map_err(fail)?;
    Ok(entry)
}
