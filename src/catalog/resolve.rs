use serde::{Deserialize, Serialize};

use crate::core::{CatalogProduct, ImportedLineItem, ProductId};

/// Which key tied an imported line to a catalog product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKey {
    /// Supplier product code equals the product's stored code.
    Code,
    /// GTIN/EAN equality.
    Barcode,
    /// Case-insensitive equality of description and product name.
    Name,
}

/// A catalog hit together with the product state at lookup time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub key: MatchKey,
    pub product: CatalogProduct,
}

/// Outcome of looking one imported line up in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemResolution {
    pub line_number: u32,
    /// `None` means the line describes a product the catalog does not know.
    pub matched: Option<ProductMatch>,
}

impl LineItemResolution {
    pub fn is_new(&self) -> bool {
        self.matched.is_none()
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.matched.as_ref().map(|m| m.product.id)
    }

    pub fn key(&self) -> Option<MatchKey> {
        self.matched.as_ref().map(|m| m.key)
    }
}

/// Resolve one line against a catalog snapshot.
///
/// Precedence: code, then barcode, then exact name. The first product in
/// snapshot order wins within a key.
pub fn resolve_line(line: &ImportedLineItem, catalog: &[CatalogProduct]) -> LineItemResolution {
    let matched = match_by_code(line, catalog)
        .map(|p| (MatchKey::Code, p))
        .or_else(|| match_by_barcode(line, catalog).map(|p| (MatchKey::Barcode, p)))
        .or_else(|| match_by_name(line, catalog).map(|p| (MatchKey::Name, p)))
        .map(|(key, product)| ProductMatch {
            key,
            product: product.clone(),
        });

    LineItemResolution {
        line_number: line.line_number,
        matched,
    }
}

/// Resolve every line of a document, preserving input order.
pub fn resolve_lines(
    lines: &[ImportedLineItem],
    catalog: &[CatalogProduct],
) -> Vec<LineItemResolution> {
    lines.iter().map(|l| resolve_line(l, catalog)).collect()
}

/// A barcode is usable for matching only if it is all digits, at least
/// eight long (GTIN-8) and not all zeros.
pub fn is_usable_barcode(code: &str) -> bool {
    let code = code.trim();
    code.len() >= 8 && code.bytes().all(|b| b.is_ascii_digit()) && code.bytes().any(|b| b != b'0')
}

fn match_by_code<'a>(
    line: &ImportedLineItem,
    catalog: &'a [CatalogProduct],
) -> Option<&'a CatalogProduct> {
    let code = line.code.trim();
    if code.is_empty() {
        return None;
    }
    catalog.iter().find(|p| {
        p.code
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(code))
    })
}

fn match_by_barcode<'a>(
    line: &ImportedLineItem,
    catalog: &'a [CatalogProduct],
) -> Option<&'a CatalogProduct> {
    let barcode = line.barcode.as_deref().map(str::trim)?;
    if !is_usable_barcode(barcode) {
        return None;
    }
    catalog
        .iter()
        .find(|p| p.barcode.as_deref().is_some_and(|b| b.trim() == barcode))
}

fn match_by_name<'a>(
    line: &ImportedLineItem,
    catalog: &'a [CatalogProduct],
) -> Option<&'a CatalogProduct> {
    let name = fold(&line.description);
    if name.is_empty() {
        return None;
    }
    catalog.iter().find(|p| fold(&p.name) == name)
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}
