use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! store_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

store_id!(
    /// Identity of a persisted invoice header.
    HeaderId
);
store_id!(
    /// Identity of a supplier (counterparty) record.
    SupplierId
);
store_id!(
    /// Identity of a catalog product.
    ProductId
);
store_id!(
    /// Identity of a ledger (cash-flow) entry.
    LedgerEntryId
);
store_id!(
    /// Identity of an accounts-payable record.
    PayableId
);

/// A parsed supplier invoice: header plus line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedInvoice {
    pub header: ImportedInvoiceHeader,
    pub lines: Vec<ImportedLineItem>,
}

/// Header of an imported NF-e.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedInvoiceHeader {
    /// 44-digit access key (`chNFe`), without the `NFe` prefix. Globally unique
    /// when present; used as the idempotency key of the import.
    pub access_key: Option<String>,
    /// Document number (`nNF`).
    pub number: String,
    /// Series (`serie`).
    pub series: String,
    /// Issue date, truncated from the `dhEmi` timestamp.
    pub issue_date: NaiveDate,
    /// Nature of the operation (`natOp`).
    pub nature_of_operation: Option<String>,
    /// The issuing supplier (`emit`).
    pub counterparty: Counterparty,
    pub totals: InvoiceTotals,
    /// Payment method of the first `detPag` group.
    pub payment_method: PaymentMethod,
    /// Billing installments (`cobr/dup`), in document order.
    pub installments: Vec<Installment>,
}

impl ImportedInvoiceHeader {
    /// Access key if present and non-blank.
    pub fn access_key(&self) -> Option<&str> {
        self.access_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Human-readable label used for ledger descriptions, e.g. "NF-e 123/1 - Acme Corp".
    pub fn document_label(&self) -> String {
        let mut label = format!("NF-e {}", self.number);
        if !self.series.is_empty() {
            label.push('/');
            label.push_str(&self.series);
        }
        if !self.counterparty.legal_name.is_empty() {
            label.push_str(" - ");
            label.push_str(&self.counterparty.legal_name);
        }
        label
    }

    /// Due date derived from the document: the first installment that has one.
    pub fn first_due_date(&self) -> Option<NaiveDate> {
        self.installments.iter().find_map(|i| i.due_date)
    }
}

/// Supplier or customer referenced by a fiscal document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counterparty {
    /// CNPJ or CPF, digits only.
    pub tax_id: String,
    /// Legal name (`xNome`).
    pub legal_name: String,
    /// Trade name (`xFant`).
    pub trade_name: Option<String>,
    /// State registration (`IE`).
    pub state_registration: Option<String>,
    pub address: Address,
}

/// Postal address as printed on an NF-e (`enderEmit`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub district: Option<String>,
    /// IBGE municipality code (`cMun`).
    pub city_code: Option<String>,
    pub city: Option<String>,
    /// Two-letter state code (`UF`).
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
}

/// Document totals (`ICMSTot`). Absent values are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub products: Decimal,
    pub freight: Decimal,
    pub insurance: Decimal,
    pub discount: Decimal,
    pub other: Decimal,
    pub ipi: Decimal,
    /// Grand total of the document (`vNF`).
    pub grand_total: Decimal,
}

/// One billing installment (`dup`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub number: String,
    pub due_date: Option<NaiveDate>,
    pub amount: Decimal,
}

/// Payment method codes (`tPag`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// 01
    Cash,
    /// 02
    Cheque,
    /// 03
    CreditCard,
    /// 04
    DebitCard,
    /// 05: store credit.
    StoreCredit,
    /// 10 to 13: meal and food vouchers, gift cards, fuel.
    Voucher,
    /// 15: bank slip.
    Boleto,
    /// 16
    BankDeposit,
    /// 17
    Pix,
    /// 18
    BankTransfer,
    /// 90
    NoPayment,
    /// 99 or any unknown code.
    Other(String),
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl PaymentMethod {
    /// Parse from a `tPag` code.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "01" | "1" => Self::Cash,
            "02" | "2" => Self::Cheque,
            "03" | "3" => Self::CreditCard,
            "04" | "4" => Self::DebitCard,
            "05" | "5" => Self::StoreCredit,
            "10" | "11" | "12" | "13" => Self::Voucher,
            "15" => Self::Boleto,
            "16" => Self::BankDeposit,
            "17" => Self::Pix,
            "18" => Self::BankTransfer,
            "90" => Self::NoPayment,
            other => Self::Other(other.to_string()),
        }
    }

    /// `tPag` code. Vouchers report the meal voucher code.
    pub fn code(&self) -> &str {
        match self {
            Self::Cash => "01",
            Self::Cheque => "02",
            Self::CreditCard => "03",
            Self::DebitCard => "04",
            Self::StoreCredit => "05",
            Self::Voucher => "10",
            Self::Boleto => "15",
            Self::BankDeposit => "16",
            Self::Pix => "17",
            Self::BankTransfer => "18",
            Self::NoPayment => "90",
            Self::Other(code) => code,
        }
    }

    /// Whether settlement happens after the purchase and so warrants a payable.
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            Self::Cheque | Self::CreditCard | Self::StoreCredit | Self::Boleto
        )
    }
}

/// One `det` line of an imported NF-e.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedLineItem {
    /// 1-based item number (`nItem`).
    pub line_number: u32,
    /// Supplier's product code (`cProd`).
    pub code: String,
    /// Product description (`xProd`).
    pub description: String,
    pub tax: TaxClassification,
    /// Canonical unit token, see [`crate::core::units::normalize_unit`].
    pub unit: String,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    /// Line total (`vProd`).
    pub total: Decimal,
    pub discount: Decimal,
    /// GTIN/EAN, absent when the document carries `SEM GTIN`.
    pub barcode: Option<String>,
}

/// Fiscal classification codes of a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxClassification {
    pub ncm: Option<String>,
    pub cest: Option<String>,
    pub cfop: Option<String>,
}

/// A product of the local catalog, as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    /// Supplier code this product was imported under.
    pub code: Option<String>,
    pub name: String,
    pub barcode: Option<String>,
    pub unit: String,
    pub last_purchase_cost: Decimal,
    pub average_cost: Decimal,
    pub sale_price: Decimal,
    pub margin_percent: Decimal,
    pub stock_quantity: Decimal,
}

/// Per-line verb chosen by the user or defaulted by the system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "action", content = "target")]
pub enum LineItemAction {
    /// Create when unmatched, update the matched product otherwise.
    #[default]
    Auto,
    /// Bind to an explicitly chosen product. The target must be set before
    /// the import runs.
    Link(Option<ProductId>),
    /// Always create a new product.
    ForceCreate,
    /// No catalog or stock effect.
    Skip,
}

/// A recorded cash-flow event, typically from a bank statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
    pub counterparty: Option<SupplierId>,
    /// Whether a fiscal document backs this entry.
    pub has_source_document: bool,
    pub reconciled: bool,
    /// Reference of the bank statement line this entry came from.
    pub statement_ref: Option<String>,
    /// Imported invoice this entry is backed by.
    pub document: Option<HeaderId>,
}

/// Strip everything but digits from a CNPJ/CPF.
pub fn normalize_tax_id(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
