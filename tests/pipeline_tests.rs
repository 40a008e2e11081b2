use chrono::NaiveDate;
use nfe_import::catalog::{CostUpdate, NewProduct};
use nfe_import::core::*;
use nfe_import::import::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn acme() -> Counterparty {
    CounterpartyBuilder::new("12.345.678/0001-90", "Acme Corp")
        .trade_name("Acme")
        .build()
}

/// One line, code P1, 10 x 5.00.
fn single_line_invoice(access_key: &str) -> ImportedInvoice {
    ImportedInvoiceBuilder::new("123", date(2024, 3, 10))
        .access_key(access_key)
        .counterparty(acme())
        .add_line(LineItemBuilder::new(1, "P1", "Parafuso 3mm", dec!(10), "UN", dec!(5.00)).build())
        .build()
}

fn three_line_invoice() -> ImportedInvoice {
    ImportedInvoiceBuilder::new("456", date(2024, 3, 10))
        .access_key("35240312345678000190550010000004561000004560")
        .counterparty(acme())
        .add_line(LineItemBuilder::new(1, "P1", "Parafuso 3mm", dec!(10), "UN", dec!(5)).build())
        .add_line(LineItemBuilder::new(2, "N2", "Bucha 6mm", dec!(100), "UN", dec!(0.20)).build())
        .add_line(LineItemBuilder::new(3, "N3", "Broca 6mm", dec!(2), "UN", dec!(15)).build())
        .build()
}

/// Invoice for 1200.00 issued 2024-03-10 by "Acme Corp".
fn ledger_invoice(access_key: &str, payment: PaymentMethod) -> ImportedInvoice {
    ImportedInvoiceBuilder::new("123", date(2024, 3, 10))
        .access_key(access_key)
        .counterparty(acme())
        .payment_method(payment)
        .add_line(LineItemBuilder::new(1, "P1", "Parafuso 3mm", dec!(240), "UN", dec!(5)).build())
        .build()
}

fn screw() -> CatalogProduct {
    ProductBuilder::new(1, "Parafuso 3mm")
        .code("P1")
        .cost(dec!(4.00))
        .sale_price(dec!(4.80))
        .margin_percent(dec!(20))
        .stock(dec!(3))
        .build()
}

fn store_with_screw() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.add_product(screw());
    store
}

fn plan_for(store: &MemoryStore, invoice: ImportedInvoice) -> ImportPlan {
    ImportPlan::resolve(invoice, &store.catalog())
}

fn ledger_pipeline() -> ImportPipeline {
    ImportPipeline::new(
        ImportOptionsBuilder::new()
            .apply_to_ledger(true)
            .generate_payable(true)
            .build(),
    )
}

#[test]
fn matched_line_updates_cost_price_and_stock() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, single_line_invoice("NFe123"));

    let outcome = ImportPipeline::default().run(&mut store, &plan).unwrap();
    assert!(outcome.is_complete());

    let movements = store.stock_movements();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].product, ProductId(1));
    assert_eq!(movements[0].quantity, dec!(10));
    assert_eq!(movements[0].unit_value, dec!(5.00));
    assert_eq!(movements[0].total, dec!(50.00));
    assert_eq!(movements[0].header, outcome.report().header);

    let product = store.get_product(ProductId(1)).unwrap();
    assert_eq!(product.last_purchase_cost, dec!(5.00));
    assert_eq!(product.average_cost, dec!(5.00));
    assert_eq!(product.sale_price, dec!(6.00));
    assert_eq!(product.margin_percent, dec!(20));
    assert_eq!(product.stock_quantity, dec!(13));

    let report = outcome.report();
    assert_eq!(report.lines[0].action, AppliedAction::Updated);
    assert_eq!(report.lines[0].product, Some(ProductId(1)));
    assert_eq!(report.stock_movements, 1);
    assert_eq!(report.ledger, LedgerOutcome::NotRequested);
    assert_eq!(report.payable, None);
}

#[test]
fn second_import_of_same_key_is_rejected_before_any_mutation() {
    let mut store = store_with_screw();
    let pipeline = ImportPipeline::default();
    let plan = plan_for(&store, single_line_invoice("NFe123"));
    pipeline.run(&mut store, &plan).unwrap();

    let plan = plan_for(&store, single_line_invoice("NFe123"));
    let err = pipeline.run(&mut store, &plan).unwrap_err();

    assert!(err.is_duplicate());
    assert!(matches!(err, ImportError::DuplicateDocument { ref access_key } if access_key == "NFe123"));
    assert_eq!(store.headers().count(), 1);
    assert_eq!(store.stock_movements().len(), 1);
    assert_eq!(store.invoice_lines().len(), 1);
    assert_eq!(store.get_product(ProductId(1)).unwrap().stock_quantity, dec!(13));
}

#[test]
fn documents_without_access_key_are_not_deduplicated() {
    let mut store = store_with_screw();
    let pipeline = ImportPipeline::default();
    for _ in 0..2 {
        let plan = plan_for(&store, single_line_invoice("  "));
        pipeline.run(&mut store, &plan).unwrap();
    }
    assert_eq!(store.headers().count(), 2);
    assert!(store.headers().all(|h| h.header.access_key.is_none()));
}

#[test]
fn unmatched_line_creates_product() {
    let mut store = MemoryStore::new();
    let plan = plan_for(&store, single_line_invoice("K-NEW"));

    let outcome = ImportPipeline::default().run(&mut store, &plan).unwrap();
    let line = &outcome.report().lines[0];
    assert_eq!(line.action, AppliedAction::Created);

    let product = store.get_product(line.product.unwrap()).unwrap();
    assert_eq!(product.code.as_deref(), Some("P1"));
    assert_eq!(product.name, "Parafuso 3mm");
    assert_eq!(product.last_purchase_cost, dec!(5.00));
    assert_eq!(product.sale_price, dec!(5.00));
    assert_eq!(product.stock_quantity, dec!(10));

    assert_eq!(store.invoice_lines()[0].outcome, LineOutcome::Created);
}

#[test]
fn created_products_get_default_margin() {
    let mut store = MemoryStore::new();
    let plan = plan_for(&store, single_line_invoice("K-MARGIN"));
    let pipeline = ImportPipeline::new(
        ImportOptionsBuilder::new()
            .default_margin_percent(dec!(30))
            .build(),
    );

    let outcome = pipeline.run(&mut store, &plan).unwrap();
    let product = store
        .get_product(outcome.report().lines[0].product.unwrap())
        .unwrap();
    assert_eq!(product.margin_percent, dec!(30));
    assert_eq!(product.sale_price, dec!(6.50));
}

#[test]
fn recompute_disabled_keeps_sale_price() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, single_line_invoice("K-KEEP"));
    let pipeline = ImportPipeline::new(
        ImportOptionsBuilder::new()
            .recompute_sale_price(false)
            .build(),
    );

    pipeline.run(&mut store, &plan).unwrap();
    let product = store.get_product(ProductId(1)).unwrap();
    assert_eq!(product.last_purchase_cost, dec!(5.00));
    assert_eq!(product.sale_price, dec!(4.80));
}

#[test]
fn stock_disabled_records_no_movement() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, single_line_invoice("K-NOSTOCK"));
    let pipeline = ImportPipeline::new(ImportOptionsBuilder::new().apply_to_stock(false).build());

    let outcome = pipeline.run(&mut store, &plan).unwrap();
    assert_eq!(outcome.report().stock_movements, 0);
    assert!(store.stock_movements().is_empty());
    assert_eq!(store.get_product(ProductId(1)).unwrap().stock_quantity, dec!(3));
    assert_eq!(store.invoice_lines().len(), 1);
}

#[test]
fn skipped_line_is_recorded_without_effects() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, single_line_invoice("K-SKIP"))
        .with_action(1, LineItemAction::Skip)
        .unwrap();

    let outcome = ImportPipeline::default().run(&mut store, &plan).unwrap();
    assert_eq!(outcome.report().lines[0].action, AppliedAction::Skipped);
    assert!(store.stock_movements().is_empty());

    let record = &store.invoice_lines()[0];
    assert_eq!(record.outcome, LineOutcome::Skipped);
    assert_eq!(record.product, None);
    assert_eq!(record.code, "P1");

    let product = store.get_product(ProductId(1)).unwrap();
    assert_eq!(product.last_purchase_cost, dec!(4.00));
}

#[test]
fn force_create_ignores_existing_match() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, single_line_invoice("K-FORCE"))
        .with_action(1, LineItemAction::ForceCreate)
        .unwrap();
    assert_eq!(plan.resolution(1).unwrap().product_id(), Some(ProductId(1)));

    let outcome = ImportPipeline::default().run(&mut store, &plan).unwrap();
    let line = &outcome.report().lines[0];
    assert_eq!(line.action, AppliedAction::Created);
    assert_ne!(line.product, Some(ProductId(1)));
    assert_eq!(store.catalog().len(), 2);
    assert_eq!(store.get_product(ProductId(1)).unwrap(), &screw());
    assert_eq!(store.stock_movements()[0].product, line.product.unwrap());
}

#[test]
fn link_updates_the_chosen_product_not_the_resolved_one() {
    let mut store = store_with_screw();
    store.add_product(
        ProductBuilder::new(2, "Parafuso inox 3mm")
            .cost(dec!(8))
            .margin_percent(dec!(50))
            .build(),
    );
    let plan = plan_for(&store, single_line_invoice("K-LINK"))
        .with_action(1, LineItemAction::Link(Some(ProductId(2))))
        .unwrap();

    let outcome = ImportPipeline::default().run(&mut store, &plan).unwrap();
    let line = &outcome.report().lines[0];
    assert_eq!(line.action, AppliedAction::Linked);
    assert_eq!(line.product, Some(ProductId(2)));

    let linked = store.get_product(ProductId(2)).unwrap();
    assert_eq!(linked.last_purchase_cost, dec!(5.00));
    assert_eq!(linked.sale_price, dec!(7.50));
    assert_eq!(linked.stock_quantity, dec!(10));
    assert_eq!(store.get_product(ProductId(1)).unwrap(), &screw());
    assert_eq!(store.invoice_lines()[0].outcome, LineOutcome::Existing);
}

#[test]
fn missing_link_target_blocks_every_line() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, three_line_invoice())
        .with_action(3, LineItemAction::Link(None))
        .unwrap();

    let err = ImportPipeline::default().run(&mut store, &plan).unwrap_err();
    assert!(matches!(err, ImportError::MissingLinkTarget { ref lines } if lines == &vec![3]));

    assert_eq!(store.headers().count(), 0);
    assert!(store.suppliers().is_empty());
    assert_eq!(store.catalog(), vec![screw()]);
    assert!(store.stock_movements().is_empty());
    assert!(store.invoice_lines().is_empty());
}

#[test]
fn link_to_unknown_product_fails_on_that_line() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, single_line_invoice("K-GONE"))
        .with_action(1, LineItemAction::Link(Some(ProductId(99))))
        .unwrap();

    match ImportPipeline::default().run(&mut store, &plan).unwrap_err() {
        ImportError::Step {
            step,
            line,
            header,
            source,
        } => {
            assert_eq!(step, ImportStep::LinkProduct);
            assert_eq!(line, Some(1));
            assert!(header.is_some());
            assert!(matches!(source, StoreError::NotFound { entity: "product", .. }));
        }
        other => panic!("expected a step error, got {other:?}"),
    }
}

#[test]
fn failure_keeps_header_and_earlier_lines() {
    let mut store = store_with_screw();
    store.fail_after(StoreOp::StockMovement, 1);
    let plan = plan_for(&store, three_line_invoice());

    let err = ImportPipeline::default().run(&mut store, &plan).unwrap_err();
    let header_id = store.headers().next().unwrap().id;
    match &err {
        ImportError::Step {
            step, line, header, ..
        } => {
            assert_eq!(*step, ImportStep::StockMovement);
            assert_eq!(*line, Some(2));
            assert_eq!(*header, Some(header_id));
        }
        other => panic!("expected a step error, got {other:?}"),
    }
    assert!(err.to_string().contains("line 2"));

    // Line 1 complete, line 2 stopped after its product, line 3 untouched.
    assert_eq!(store.stock_movements().len(), 1);
    assert_eq!(store.invoice_lines().len(), 1);
    assert_eq!(store.invoice_lines()[0].line_number, 1);
    assert_eq!(store.catalog().len(), 2);
    assert!(!store.catalog().iter().any(|p| p.code.as_deref() == Some("N3")));
}

#[test]
fn existing_supplier_is_reused() {
    let mut store = store_with_screw();
    let supplier = store.add_supplier(NewSupplier {
        tax_id: "12345678000190".into(),
        legal_name: "Acme Corp".into(),
        trade_name: None,
        state_registration: None,
        address: Address::default(),
    });
    let plan = plan_for(&store, single_line_invoice("K-SUP"));

    let outcome = ImportPipeline::default().run(&mut store, &plan).unwrap();
    assert_eq!(outcome.report().supplier, SupplierOutcome::Existing(supplier));
    assert_eq!(store.suppliers().len(), 1);
    assert_eq!(store.header(outcome.report().header).unwrap().header.supplier, supplier);
}

#[test]
fn unknown_supplier_is_created() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, single_line_invoice("K-NEWSUP"));

    let outcome = ImportPipeline::default().run(&mut store, &plan).unwrap();
    assert!(matches!(outcome.report().supplier, SupplierOutcome::Created(_)));
    let stored = &store.suppliers()[0].supplier;
    assert_eq!(stored.tax_id, "12345678000190");
    assert_eq!(stored.trade_name.as_deref(), Some("Acme"));
}

#[test]
fn repeated_line_numbers_are_refused_before_any_write() {
    let mut store = store_with_screw();
    let invoice = ImportedInvoiceBuilder::new("124", date(2024, 3, 10))
        .access_key("K-DUPLINE")
        .counterparty(acme())
        .add_line(LineItemBuilder::new(1, "P1", "Parafuso 3mm", dec!(1), "UN", dec!(5.00)).build())
        .add_line(LineItemBuilder::new(1, "NEW9", "Novo", dec!(3), "UN", dec!(99.00)).build())
        .build();
    let plan = plan_for(&store, invoice);

    let err = ImportPipeline::default().run(&mut store, &plan).unwrap_err();
    assert!(matches!(err, ImportError::DuplicateLineNumber { line: 1 }));
    assert_eq!(store.headers().count(), 0);
    assert!(store.stock_movements().is_empty());
    let screw = store.get_product(ProductId(1)).unwrap();
    assert_eq!(screw.last_purchase_cost, dec!(4.00));
    assert_eq!(screw.stock_quantity, dec!(3));
    assert_eq!(store.products().count(), 1);
}

#[test]
fn confident_ledger_match_reconciles_in_place() {
    let mut store = store_with_screw();
    store.add_ledger_entry(
        LedgerEntryBuilder::new(500, dec!(1200.00), date(2024, 3, 11))
            .description("payment to Acme Corp")
            .statement_ref("EXT-0001")
            .build(),
    );
    let plan = plan_for(&store, ledger_invoice("K-LEDGER", PaymentMethod::Pix));

    let outcome = ledger_pipeline().run(&mut store, &plan).unwrap();
    let report = outcome.report();
    assert!(matches!(
        report.ledger,
        LedgerOutcome::Reconciled { entry: LedgerEntryId(500), .. }
    ));

    assert_eq!(store.ledger_entries().count(), 1);
    let entry = store.ledger_entry(LedgerEntryId(500)).unwrap();
    assert!(entry.reconciled);
    assert!(entry.has_source_document);
    assert_eq!(entry.document, Some(report.header));
    assert_eq!(entry.description, "NF-e 123/1 - Acme Corp");
    assert_eq!(entry.statement_ref.as_deref(), Some("EXT-0001"));

    let header = store.header(report.header).unwrap();
    assert_eq!(header.ledger_entry, Some(LedgerEntryId(500)));
    // PIX is settled on the spot.
    assert_eq!(report.payable, None);
}

#[test]
fn no_ledger_match_creates_entry() {
    let mut store = store_with_screw();
    store.add_ledger_entry(
        LedgerEntryBuilder::new(500, dec!(75.00), date(2024, 3, 11))
            .description("Tarifa")
            .build(),
    );
    let plan = plan_for(&store, ledger_invoice("K-NEWENTRY", PaymentMethod::Cash));

    let outcome = ledger_pipeline().run(&mut store, &plan).unwrap();
    let LedgerOutcome::Created { entry } = outcome.report().ledger else {
        panic!("expected a created entry, got {:?}", outcome.report().ledger);
    };

    let created = store.ledger_entry(entry).unwrap();
    assert_eq!(created.amount, dec!(1200));
    assert_eq!(created.date, date(2024, 3, 10));
    assert!(!created.reconciled);
    assert!(created.has_source_document);
    assert_eq!(created.counterparty, Some(outcome.report().supplier.id()));
    assert!(!store.ledger_entry(LedgerEntryId(500)).unwrap().reconciled);
}

#[test]
fn single_weak_candidate_creates_entry() {
    let mut store = store_with_screw();
    store.add_ledger_entry(
        LedgerEntryBuilder::new(500, dec!(1000.00), date(2024, 3, 14))
            .description("TED 0042")
            .build(),
    );
    let plan = plan_for(&store, ledger_invoice("K-WEAK", PaymentMethod::Cash));

    let outcome = ledger_pipeline().run(&mut store, &plan).unwrap();
    assert!(matches!(outcome.report().ledger, LedgerOutcome::Created { .. }));
    assert_eq!(store.ledger_entries().count(), 2);
}

fn ambiguous_store() -> MemoryStore {
    let mut store = store_with_screw();
    store.add_ledger_entry(
        LedgerEntryBuilder::new(500, dec!(1200.00), date(2024, 3, 11))
            .description("PIX ACME")
            .build(),
    );
    store.add_ledger_entry(
        LedgerEntryBuilder::new(501, dec!(1200.00), date(2024, 3, 11))
            .description("TED ACME")
            .build(),
    );
    store
}

fn suspend(store: &mut MemoryStore, key: &str) -> (ImportReport, PendingReconciliation) {
    let plan = plan_for(store, ledger_invoice(key, PaymentMethod::Boleto));
    match ledger_pipeline().run(store, &plan).unwrap() {
        ImportOutcome::AwaitingReconciliation { report, pending } => (report, pending),
        other => panic!("expected suspension, got {other:?}"),
    }
}

#[test]
fn ambiguous_match_suspends_with_ranked_candidates() {
    let mut store = ambiguous_store();
    let (report, pending) = suspend(&mut store, "K-AMB");

    assert_eq!(report.ledger, LedgerOutcome::AwaitingChoice);
    assert_eq!(pending.header, report.header);
    assert_eq!(pending.query.amount, dec!(1200));
    let ids: Vec<LedgerEntryId> = pending.candidates.iter().map(|c| c.entry.id).collect();
    assert_eq!(ids, vec![LedgerEntryId(500), LedgerEntryId(501)]);

    // Lines and payable are committed; the ledger is untouched.
    assert_eq!(store.stock_movements().len(), 1);
    assert_eq!(store.payables().len(), 1);
    assert_eq!(report.payable, Some(store.payables()[0].id));
    assert!(store.ledger_entries().all(|e| !e.reconciled));
    assert_eq!(store.ledger_entries().count(), 2);
}

#[test]
fn resume_with_chosen_candidate() {
    let mut store = ambiguous_store();
    let (report, pending) = suspend(&mut store, "K-CHOOSE");

    let outcome = ledger_pipeline()
        .resume(&mut store, pending, ReconciliationChoice::Candidate(LedgerEntryId(501)))
        .unwrap();
    assert!(matches!(
        outcome,
        LedgerOutcome::Reconciled { entry: LedgerEntryId(501), .. }
    ));
    assert!(store.ledger_entry(LedgerEntryId(501)).unwrap().reconciled);
    assert!(!store.ledger_entry(LedgerEntryId(500)).unwrap().reconciled);
    assert_eq!(
        store.header(report.header).unwrap().ledger_entry,
        Some(LedgerEntryId(501))
    );
}

#[test]
fn resume_with_unknown_candidate_is_rejected() {
    let mut store = ambiguous_store();
    let (_, pending) = suspend(&mut store, "K-UNKNOWN");

    let err = ledger_pipeline()
        .resume(&mut store, pending, ReconciliationChoice::Candidate(LedgerEntryId(9)))
        .unwrap_err();
    assert!(matches!(err, ImportError::UnknownCandidate { entry: LedgerEntryId(9) }));
    assert!(store.ledger_entries().all(|e| !e.reconciled));
}

#[test]
fn resume_with_create_new() {
    let mut store = ambiguous_store();
    let (report, pending) = suspend(&mut store, "K-CREATE");

    let outcome = ledger_pipeline()
        .resume(&mut store, pending, ReconciliationChoice::CreateNew)
        .unwrap();
    let LedgerOutcome::Created { entry } = outcome else {
        panic!("expected a created entry, got {outcome:?}");
    };
    assert_eq!(store.ledger_entries().count(), 3);
    assert_eq!(store.ledger_entry(entry).unwrap().document, Some(report.header));
}

#[test]
fn resuming_twice_posts_once() {
    let mut store = ambiguous_store();
    let (report, pending) = suspend(&mut store, "K-TWICE");
    let pipeline = ledger_pipeline();

    let first = pipeline
        .resume(&mut store, pending.clone(), ReconciliationChoice::CreateNew)
        .unwrap();
    let LedgerOutcome::Created { entry } = first else {
        panic!("expected a created entry, got {first:?}");
    };

    let err = pipeline
        .resume(&mut store, pending.clone(), ReconciliationChoice::CreateNew)
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::AlreadyPosted { header, entry: posted } if header == report.header && posted == entry
    ));
    let err = pipeline
        .resume(&mut store, pending.clone(), ReconciliationChoice::Candidate(LedgerEntryId(500)))
        .unwrap_err();
    assert!(matches!(err, ImportError::AlreadyPosted { .. }));
    assert_eq!(store.ledger_entries().count(), 3);
    assert!(!store.ledger_entry(LedgerEntryId(500)).unwrap().reconciled);

    // Abandoning never writes, so it is always accepted.
    assert_eq!(
        pipeline
            .resume(&mut store, pending, ReconciliationChoice::Abandon)
            .unwrap(),
        LedgerOutcome::Abandoned
    );
}

#[test]
fn abandoned_reconciliation_keeps_earlier_steps() {
    let mut store = ambiguous_store();
    let (_, pending) = suspend(&mut store, "K-ABANDON");

    let outcome = ledger_pipeline()
        .resume(&mut store, pending, ReconciliationChoice::Abandon)
        .unwrap();
    assert_eq!(outcome, LedgerOutcome::Abandoned);
    assert_eq!(store.ledger_entries().count(), 2);
    assert!(store.ledger_entries().all(|e| !e.reconciled));
    assert_eq!(store.headers().count(), 1);
    assert_eq!(store.payables().len(), 1);
    assert_eq!(store.stock_movements().len(), 1);
}

#[test]
fn pending_reconciliation_survives_serialization() {
    let mut store = ambiguous_store();
    let (_, pending) = suspend(&mut store, "K-SERDE");
    let json = serde_json::to_string(&pending).unwrap();
    let restored: PendingReconciliation = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.header, pending.header);
    assert_eq!(restored.query, pending.query);
    assert_eq!(restored.candidates.len(), 2);

    let outcome = ledger_pipeline()
        .resume(&mut store, restored, ReconciliationChoice::Candidate(LedgerEntryId(500)))
        .unwrap();
    assert!(matches!(outcome, LedgerOutcome::Reconciled { .. }));
}

#[test]
fn deferred_payment_creates_payable_due_on_first_installment() {
    let mut store = store_with_screw();
    let invoice = ImportedInvoiceBuilder::new("77", date(2024, 3, 10))
        .access_key("K-PAYABLE")
        .counterparty(acme())
        .payment_method(PaymentMethod::Boleto)
        .add_installment("001", date(2024, 4, 9), dec!(25))
        .add_installment("002", date(2024, 5, 9), dec!(25))
        .add_line(LineItemBuilder::new(1, "P1", "Parafuso 3mm", dec!(10), "UN", dec!(5)).build())
        .build();
    let plan = plan_for(&store, invoice);
    let pipeline = ImportPipeline::new(ImportOptionsBuilder::new().generate_payable(true).build());

    let outcome = pipeline.run(&mut store, &plan).unwrap();
    let payable = &store.payables()[0];
    assert_eq!(outcome.report().payable, Some(payable.id));
    assert_eq!(payable.payable.amount, dec!(50));
    assert_eq!(payable.payable.due_date, date(2024, 4, 9));
    assert_eq!(payable.payable.document, outcome.report().header);
}

#[test]
fn caller_due_date_wins() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, ledger_invoice("K-DUE", PaymentMethod::CreditCard));
    let pipeline = ImportPipeline::new(
        ImportOptionsBuilder::new()
            .generate_payable(true)
            .payable_due_date(date(2024, 6, 1))
            .build(),
    );

    pipeline.run(&mut store, &plan).unwrap();
    assert_eq!(store.payables()[0].payable.due_date, date(2024, 6, 1));
}

#[test]
fn immediate_payment_creates_no_payable() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, ledger_invoice("K-CASH", PaymentMethod::Cash));
    let pipeline = ImportPipeline::new(ImportOptionsBuilder::new().generate_payable(true).build());

    let outcome = pipeline.run(&mut store, &plan).unwrap();
    assert_eq!(outcome.report().payable, None);
    assert!(store.payables().is_empty());
}

#[test]
fn payable_failure_names_the_step() {
    let mut store = store_with_screw();
    store.fail_after(StoreOp::CreatePayable, 0);
    let plan = plan_for(&store, ledger_invoice("K-PFAIL", PaymentMethod::Boleto));
    let pipeline = ImportPipeline::new(ImportOptionsBuilder::new().generate_payable(true).build());

    let err = pipeline.run(&mut store, &plan).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Step { step: ImportStep::Payable, line: None, header: Some(_), .. }
    ));
    assert_eq!(store.invoice_lines().len(), 1);
}

/// Store whose existence check misses concurrent imports, leaving the
/// unique constraint as the only guard.
struct StaleExistenceCheck(MemoryStore);

impl ImportStore for StaleExistenceCheck {
    fn header_exists(&self, _access_key: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
    fn find_supplier_by_tax_id(&self, tax_id: &str) -> Result<Option<SupplierId>, StoreError> {
        self.0.find_supplier_by_tax_id(tax_id)
    }
    fn create_supplier(&mut self, supplier: NewSupplier) -> Result<SupplierId, StoreError> {
        self.0.create_supplier(supplier)
    }
    fn insert_header(&mut self, header: NewInvoiceHeader) -> Result<HeaderId, StoreError> {
        self.0.insert_header(header)
    }
    fn set_header_ledger_entry(
        &mut self,
        header: HeaderId,
        entry: LedgerEntryId,
    ) -> Result<(), StoreError> {
        self.0.set_header_ledger_entry(header, entry)
    }
    fn header_ledger_entry(&self, header: HeaderId) -> Result<Option<LedgerEntryId>, StoreError> {
        self.0.header_ledger_entry(header)
    }
    fn product(&self, id: ProductId) -> Result<Option<CatalogProduct>, StoreError> {
        self.0.product(id)
    }
    fn create_product(&mut self, product: NewProduct) -> Result<ProductId, StoreError> {
        self.0.create_product(product)
    }
    fn update_product_cost(&mut self, update: CostUpdate) -> Result<(), StoreError> {
        self.0.update_product_cost(update)
    }
    fn record_stock_movement(&mut self, movement: InboundMovement) -> Result<(), StoreError> {
        self.0.record_stock_movement(movement)
    }
    fn insert_invoice_line(&mut self, line: InvoiceLineRecord) -> Result<(), StoreError> {
        self.0.insert_invoice_line(line)
    }
    fn unreconciled_ledger_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        self.0.unreconciled_ledger_entries()
    }
    fn create_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntryId, StoreError> {
        self.0.create_ledger_entry(entry)
    }
    fn reconcile_ledger_entry(
        &mut self,
        reconciliation: LedgerReconciliation,
    ) -> Result<(), StoreError> {
        self.0.reconcile_ledger_entry(reconciliation)
    }
    fn create_payable(&mut self, payable: NewPayable) -> Result<PayableId, StoreError> {
        self.0.create_payable(payable)
    }
}

#[test]
fn unique_constraint_catches_racing_import() {
    let mut store = StaleExistenceCheck(store_with_screw());
    let pipeline = ImportPipeline::default();
    let plan = plan_for(&store.0, single_line_invoice("K-RACE"));
    pipeline.run(&mut store, &plan).unwrap();

    let err = pipeline.run(&mut store, &plan).unwrap_err();
    assert!(err.is_duplicate());
    assert_eq!(store.0.headers().count(), 1);
    assert_eq!(store.0.stock_movements().len(), 1);
}

#[test]
fn runs_against_a_trait_object() {
    let mut store = store_with_screw();
    let plan = plan_for(&store, single_line_invoice("K-DYN"));
    let dyn_store: &mut dyn ImportStore = &mut store;
    ImportPipeline::default().run(dyn_store, &plan).unwrap();
    assert_eq!(store.stock_movements().len(), 1);
}

#[test]
fn wizard_end_to_end() {
    let mut store = store_with_screw();
    let mut review = UploadedDocument::new(three_line_invoice()).review(&store.catalog());
    assert_eq!(review.resolutions().iter().filter(|r| r.is_new()).count(), 2);

    review.set_action(2, LineItemAction::Skip).unwrap();
    review.set_action(3, LineItemAction::Link(None)).unwrap();
    let rejected = review.confirm().unwrap_err();
    assert!(matches!(rejected.error, ImportError::MissingLinkTarget { .. }));

    let mut review = rejected.review;
    review.link(3, ProductId(1)).unwrap();
    let confirmed = review.confirm().unwrap();

    let outcome = ImportPipeline::default()
        .run(&mut store, confirmed.plan())
        .unwrap();
    let report = outcome.report();
    assert_eq!(report.count(AppliedAction::Updated), 1);
    assert_eq!(report.count(AppliedAction::Skipped), 1);
    assert_eq!(report.count(AppliedAction::Linked), 1);
    assert_eq!(report.stock_movements, 2);
    // 3 in stock, +10 from line 1, +2 from line 3.
    assert_eq!(store.get_product(ProductId(1)).unwrap().stock_quantity, dec!(15));
    assert_eq!(
        store.get_product(ProductId(1)).unwrap().last_purchase_cost,
        Decimal::from(15)
    );
}
