use chrono::NaiveDate;
use nfe_import::core::*;
use nfe_import::import::*;
use rust_decimal_macros::dec;

const SUPPLIER_INVOICE: &str = include_str!("../tests/fixtures/nfe/supplier_invoice.xml");

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nfe_import=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // A store with one known product and two bank statement lines
    let mut store = MemoryStore::new();
    store.add_product(
        ProductBuilder::new(1, "Parafuso sextavado 3mm")
            .code("P1")
            .cost(dec!(4.00))
            .sale_price(dec!(4.80))
            .margin_percent(dec!(20))
            .build(),
    );
    store.add_product(ProductBuilder::new(2, "Cabo PP 2,5mm").unit("KG").build());
    store.add_ledger_entry(
        LedgerEntryBuilder::new(100, dec!(89.00), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap())
            .description("PIX ACME COMERCIO")
            .build(),
    );
    store.add_ledger_entry(
        LedgerEntryBuilder::new(101, dec!(89.00), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap())
            .description("TED ACME FERRAGENS")
            .build(),
    );

    // Upload
    let document = match UploadedDocument::from_xml(SUPPLIER_INVOICE) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Cannot read document: {e}");
            return;
        }
    };
    println!("Document: {}", document.invoice().header.document_label());

    // Review
    let mut review = document.review(&store.catalog());
    for resolution in review.resolutions() {
        match &resolution.matched {
            Some(m) => println!(
                "  line {}: {:?} match -> {}",
                resolution.line_number, m.key, m.product.name
            ),
            None => println!("  line {}: new product", resolution.line_number),
        }
    }

    // The cable line matches nothing; bind it to the cataloged cable.
    review.set_action(2, LineItemAction::Link(None)).unwrap();
    let mut review = match review.confirm() {
        Ok(_) => unreachable!("link without target must not confirm"),
        Err(rejected) => {
            println!("Rejected: {}", rejected.error);
            for problem in rejected.review.problems() {
                println!("  {problem}");
            }
            rejected.review
        }
    };
    review.link(2, ProductId(2)).unwrap();
    let confirmed = review.confirm().unwrap();

    // Import
    let pipeline = ImportPipeline::new(
        ImportOptionsBuilder::new()
            .apply_to_ledger(true)
            .generate_payable(true)
            .build(),
    );
    let outcome = pipeline.run(&mut store, confirmed.plan()).unwrap();
    let report = outcome.report();
    println!("\nHeader {} supplier {:?}", report.header, report.supplier);
    for line in &report.lines {
        println!("  line {} {:?} {:?}", line.line_number, line.action, line.product);
    }
    println!("Payable: {:?}", report.payable);

    // Two equally good statement lines: pick one
    if let ImportOutcome::AwaitingReconciliation { pending, .. } = outcome {
        println!("\nLedger candidates:");
        for c in &pending.candidates {
            println!(
                "  #{} {} {} score {:.2}",
                c.entry.id, c.entry.date, c.entry.description, c.score
            );
        }
        let choice = ReconciliationChoice::Candidate(pending.candidates[0].entry.id);
        let ledger = pipeline.resume(&mut store, pending, choice).unwrap();
        println!("Ledger: {ledger:?}");
    }

    for product in store.products() {
        println!(
            "\n{}: cost {} price {} stock {} {}",
            product.name,
            product.last_purchase_cost,
            product.sale_price,
            product.stock_quantity,
            product.unit
        );
    }

    // Importing the same file again is refused
    let again = UploadedDocument::from_xml(SUPPLIER_INVOICE)
        .unwrap()
        .review(&store.catalog())
        .confirm()
        .unwrap();
    match pipeline.run(&mut store, again.plan()) {
        Err(e) if e.is_duplicate() => println!("\nSecond import refused: {e}"),
        other => println!("\nUnexpected: {other:?}"),
    }
}
