use std::fmt;

use thiserror::Error;

use super::types::{HeaderId, LedgerEntryId};

/// Errors raised while reading an NF-e XML document.
///
/// A document that parses but carries no line items is *not* an error; the
/// caller decides whether an empty import is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The input is not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// Well-formed XML, but no `infNFe` element was found.
    #[error("document is not an NF-e (no infNFe element)")]
    NotAnInvoice,

    /// A mandatory header field is absent.
    #[error("missing mandatory field: {field}")]
    MissingField { field: &'static str },

    /// A numeric field holds text that is not a decimal number.
    #[error("invalid number in {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    /// A date field holds text that is not an ISO date.
    #[error("invalid date in {field}: '{value}'")]
    InvalidDate { field: &'static str, value: String },

    /// Two `det` elements carry the same item number.
    #[error("item number {line} appears more than once")]
    DuplicateItem { line: u32 },
}

/// Errors reported by an [`ImportStore`](crate::import::ImportStore) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store refused the write.
    #[error("store rejected the operation: {0}")]
    Rejected(String),

    /// A uniqueness constraint was violated.
    #[error("unique constraint '{constraint}' violated by '{value}'")]
    UniqueViolation { constraint: String, value: String },

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

/// The pipeline step that was running when a store call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportStep {
    DuplicateCheck,
    Counterparty,
    Header,
    CreateProduct,
    UpdateProduct,
    LinkProduct,
    StockMovement,
    InvoiceLine,
    Ledger,
    Payable,
}

impl ImportStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DuplicateCheck => "duplicate-check",
            Self::Counterparty => "counterparty",
            Self::Header => "header",
            Self::CreateProduct => "create-product",
            Self::UpdateProduct => "update-product",
            Self::LinkProduct => "link-product",
            Self::StockMovement => "stock-movement",
            Self::InvoiceLine => "invoice-line",
            Self::Ledger => "ledger",
            Self::Payable => "payable",
        }
    }
}

impl fmt::Display for ImportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that abort an import or a review session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    /// The XML document could not be read.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A document with this access key has already been imported.
    #[error("document with access key {access_key} was already imported")]
    DuplicateDocument { access_key: String },

    /// One or more `link` actions have no target product.
    #[error("line(s) {} are set to link but have no target product", join_lines(.lines))]
    MissingLinkTarget { lines: Vec<u32> },

    /// Two lines of the document share a line number.
    #[error("line number {line} is used by more than one line")]
    DuplicateLineNumber { line: u32 },

    /// A per-line edit referenced a line the document does not have.
    #[error("line {line} is out of range (document has {lines} lines)")]
    LineOutOfRange { line: u32, lines: usize },

    /// A store call failed; earlier steps stay committed.
    #[error("{step} failed{}: {source}", describe_position(.line, .header))]
    Step {
        step: ImportStep,
        /// 1-based line number, when the failure belongs to a line.
        line: Option<u32>,
        /// The header created before the failure, if any.
        header: Option<HeaderId>,
        #[source]
        source: StoreError,
    },

    /// The header was already posted to the ledger, e.g. by an earlier
    /// resume of the same suspended reconciliation.
    #[error("header {header} is already posted to ledger entry {entry}")]
    AlreadyPosted {
        header: HeaderId,
        entry: LedgerEntryId,
    },

    /// A reconciliation choice named an entry that was not offered.
    #[error("ledger entry {entry} is not among the reconciliation candidates")]
    UnknownCandidate { entry: LedgerEntryId },
}

impl ImportError {
    /// True when the import was refused because the access key already exists.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateDocument { .. })
    }

    pub(crate) fn step(
        step: ImportStep,
        line: Option<u32>,
        header: Option<HeaderId>,
        source: StoreError,
    ) -> Self {
        Self::Step {
            step,
            line,
            header,
            source,
        }
    }
}

fn join_lines(lines: &[u32]) -> String {
    lines
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_position(line: &Option<u32>, header: &Option<HeaderId>) -> String {
    match (line, header) {
        (Some(l), Some(h)) => format!(" on line {l} of header {h}"),
        (Some(l), None) => format!(" on line {l}"),
        (None, Some(h)) => format!(" for header {h}"),
        (None, None) => String::new(),
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "lines.3.action").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
