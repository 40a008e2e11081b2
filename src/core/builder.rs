use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::types::*;
use super::units::normalize_unit;

/// Builder for imported invoices that did not come from XML, such as
/// test fixtures or manual entry.
///
/// ```
/// use nfe_import::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let invoice = ImportedInvoiceBuilder::new("123", NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
///     .access_key("35240312345678000190550010000001231000001230")
///     .counterparty(CounterpartyBuilder::new("12.345.678/0001-90", "Acme Corp").build())
///     .add_line(LineItemBuilder::new(1, "P1", "Parafuso 3mm", dec!(10), "Und", dec!(5)).build())
///     .build();
///
/// assert_eq!(invoice.header.totals.grand_total, dec!(50));
/// assert_eq!(invoice.lines[0].unit, "UN");
/// ```
pub struct ImportedInvoiceBuilder {
    access_key: Option<String>,
    number: String,
    series: String,
    issue_date: NaiveDate,
    nature_of_operation: Option<String>,
    counterparty: Counterparty,
    freight: Decimal,
    discount: Decimal,
    grand_total: Option<Decimal>,
    payment_method: PaymentMethod,
    installments: Vec<Installment>,
    lines: Vec<ImportedLineItem>,
}

impl ImportedInvoiceBuilder {
    pub fn new(number: impl Into<String>, issue_date: NaiveDate) -> Self {
        Self {
            access_key: None,
            number: number.into(),
            series: "1".to_string(),
            issue_date,
            nature_of_operation: None,
            counterparty: Counterparty::default(),
            freight: Decimal::ZERO,
            discount: Decimal::ZERO,
            grand_total: None,
            payment_method: PaymentMethod::default(),
            installments: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn access_key(mut self, key: impl Into<String>) -> Self {
        self.access_key = Some(key.into());
        self
    }

    pub fn series(mut self, series: impl Into<String>) -> Self {
        self.series = series.into();
        self
    }

    pub fn nature_of_operation(mut self, nature: impl Into<String>) -> Self {
        self.nature_of_operation = Some(nature.into());
        self
    }

    pub fn counterparty(mut self, counterparty: Counterparty) -> Self {
        self.counterparty = counterparty;
        self
    }

    pub fn freight(mut self, freight: Decimal) -> Self {
        self.freight = freight;
        self
    }

    pub fn discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    /// Override the grand total instead of deriving it from the lines.
    pub fn grand_total(mut self, total: Decimal) -> Self {
        self.grand_total = Some(total);
        self
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn add_installment(
        mut self,
        number: impl Into<String>,
        due_date: NaiveDate,
        amount: Decimal,
    ) -> Self {
        self.installments.push(Installment {
            number: number.into(),
            due_date: Some(due_date),
            amount,
        });
        self
    }

    pub fn add_line(mut self, line: ImportedLineItem) -> Self {
        self.lines.push(line);
        self
    }

    pub fn build(self) -> ImportedInvoice {
        let products: Decimal = self.lines.iter().map(|l| l.total).sum();
        let grand_total = self
            .grand_total
            .unwrap_or(products + self.freight - self.discount);

        ImportedInvoice {
            header: ImportedInvoiceHeader {
                access_key: self.access_key,
                number: self.number,
                series: self.series,
                issue_date: self.issue_date,
                nature_of_operation: self.nature_of_operation,
                counterparty: self.counterparty,
                totals: InvoiceTotals {
                    products,
                    freight: self.freight,
                    discount: self.discount,
                    grand_total,
                    ..Default::default()
                },
                payment_method: self.payment_method,
                installments: self.installments,
            },
            lines: self.lines,
        }
    }
}

/// Builder for [`Counterparty`]. The tax id is stored digits-only.
pub struct CounterpartyBuilder {
    tax_id: String,
    legal_name: String,
    trade_name: Option<String>,
    state_registration: Option<String>,
    address: Address,
}

impl CounterpartyBuilder {
    pub fn new(tax_id: &str, legal_name: impl Into<String>) -> Self {
        Self {
            tax_id: normalize_tax_id(tax_id),
            legal_name: legal_name.into(),
            trade_name: None,
            state_registration: None,
            address: Address::default(),
        }
    }

    pub fn trade_name(mut self, name: impl Into<String>) -> Self {
        self.trade_name = Some(name.into());
        self
    }

    pub fn state_registration(mut self, ie: impl Into<String>) -> Self {
        self.state_registration = Some(ie.into());
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn build(self) -> Counterparty {
        Counterparty {
            tax_id: self.tax_id,
            legal_name: self.legal_name,
            trade_name: self.trade_name,
            state_registration: self.state_registration,
            address: self.address,
        }
    }
}

/// Builder for [`ImportedLineItem`]. The unit is normalized and the line
/// total defaults to `quantity * unit_value`.
pub struct LineItemBuilder {
    line_number: u32,
    code: String,
    description: String,
    quantity: Decimal,
    unit: String,
    unit_value: Decimal,
    total: Option<Decimal>,
    discount: Decimal,
    tax: TaxClassification,
    barcode: Option<String>,
}

impl LineItemBuilder {
    pub fn new(
        line_number: u32,
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: Decimal,
        unit: &str,
        unit_value: Decimal,
    ) -> Self {
        Self {
            line_number,
            code: code.into(),
            description: description.into(),
            quantity,
            unit: normalize_unit(unit),
            unit_value,
            total: None,
            discount: Decimal::ZERO,
            tax: TaxClassification::default(),
            barcode: None,
        }
    }

    pub fn total(mut self, total: Decimal) -> Self {
        self.total = Some(total);
        self
    }

    pub fn discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    pub fn ncm(mut self, ncm: impl Into<String>) -> Self {
        self.tax.ncm = Some(ncm.into());
        self
    }

    pub fn cfop(mut self, cfop: impl Into<String>) -> Self {
        self.tax.cfop = Some(cfop.into());
        self
    }

    pub fn barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn build(self) -> ImportedLineItem {
        ImportedLineItem {
            line_number: self.line_number,
            code: self.code,
            description: self.description,
            tax: self.tax,
            unit: self.unit,
            quantity: self.quantity,
            unit_value: self.unit_value,
            total: self
                .total
                .unwrap_or((self.quantity * self.unit_value).round_dp(2)),
            discount: self.discount,
            barcode: self.barcode,
        }
    }
}

/// Builder for [`CatalogProduct`] snapshots.
pub struct ProductBuilder {
    id: ProductId,
    code: Option<String>,
    name: String,
    barcode: Option<String>,
    unit: String,
    cost: Decimal,
    sale_price: Decimal,
    margin_percent: Decimal,
    stock_quantity: Decimal,
}

impl ProductBuilder {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: ProductId(id),
            code: None,
            name: name.into(),
            barcode: None,
            unit: "UN".to_string(),
            cost: Decimal::ZERO,
            sale_price: Decimal::ZERO,
            margin_percent: Decimal::ZERO,
            stock_quantity: Decimal::ZERO,
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = normalize_unit(unit);
        self
    }

    /// Sets both the last-purchase and the average cost.
    pub fn cost(mut self, cost: Decimal) -> Self {
        self.cost = cost;
        self
    }

    pub fn sale_price(mut self, price: Decimal) -> Self {
        self.sale_price = price;
        self
    }

    pub fn margin_percent(mut self, margin: Decimal) -> Self {
        self.margin_percent = margin;
        self
    }

    pub fn stock(mut self, quantity: Decimal) -> Self {
        self.stock_quantity = quantity;
        self
    }

    pub fn build(self) -> CatalogProduct {
        CatalogProduct {
            id: self.id,
            code: self.code,
            name: self.name,
            barcode: self.barcode,
            unit: self.unit,
            last_purchase_cost: self.cost,
            average_cost: self.cost,
            sale_price: self.sale_price,
            margin_percent: self.margin_percent,
            stock_quantity: self.stock_quantity,
        }
    }
}

/// Builder for unreconciled [`LedgerEntry`] snapshots.
pub struct LedgerEntryBuilder {
    id: LedgerEntryId,
    amount: Decimal,
    date: NaiveDate,
    description: String,
    counterparty: Option<SupplierId>,
    statement_ref: Option<String>,
}

impl LedgerEntryBuilder {
    pub fn new(id: u64, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            id: LedgerEntryId(id),
            amount,
            date,
            description: String::new(),
            counterparty: None,
            statement_ref: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn counterparty(mut self, supplier: SupplierId) -> Self {
        self.counterparty = Some(supplier);
        self
    }

    pub fn statement_ref(mut self, reference: impl Into<String>) -> Self {
        self.statement_ref = Some(reference.into());
        self
    }

    pub fn build(self) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            amount: self.amount,
            date: self.date,
            description: self.description,
            counterparty: self.counterparty,
            has_source_document: false,
            reconciled: false,
            statement_ref: self.statement_ref,
            document: None,
        }
    }
}
