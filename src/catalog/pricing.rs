use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::core::{CatalogProduct, ImportedLineItem, ProductId};

/// Intent to create a catalog product from an imported line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: Option<String>,
    pub name: String,
    pub barcode: Option<String>,
    pub unit: String,
    pub ncm: Option<String>,
    pub cost: Decimal,
    pub sale_price: Decimal,
    pub margin_percent: Decimal,
}

/// Intent to refresh the cost fields of an existing product after a purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostUpdate {
    pub product: ProductId,
    pub last_purchase_cost: Decimal,
    pub average_cost: Decimal,
    /// New sale price, when it was recomputed from the product's margin.
    pub sale_price: Option<Decimal>,
}

/// Sale price that keeps `margin_percent` over `cost`, rounded to cents.
pub fn price_from_margin(cost: Decimal, margin_percent: Decimal) -> Decimal {
    (cost * (Decimal::ONE + margin_percent / dec!(100))).round_dp(2)
}

/// Seed a new product from a line. Without a margin, the sale price equals the cost.
pub fn new_product(line: &ImportedLineItem, default_margin: Option<Decimal>) -> NewProduct {
    let margin = default_margin
        .filter(|m| *m > Decimal::ZERO)
        .unwrap_or(Decimal::ZERO);
    let sale_price = if margin > Decimal::ZERO {
        price_from_margin(line.unit_value, margin)
    } else {
        line.unit_value
    };

    let code = line.code.trim();
    NewProduct {
        code: (!code.is_empty()).then(|| code.to_string()),
        name: line.description.trim().to_string(),
        barcode: line
            .barcode
            .as_deref()
            .filter(|b| super::is_usable_barcode(b))
            .map(str::to_string),
        unit: line.unit.clone(),
        ncm: line.tax.ncm.clone(),
        cost: line.unit_value,
        sale_price,
        margin_percent: margin,
    }
}

/// Cost update for `product` bought at `unit_value`.
///
/// When `recompute_sale_price` is set and the product has a positive margin,
/// the margin is preserved rather than the absolute price.
pub fn cost_update(
    product: &CatalogProduct,
    unit_value: Decimal,
    recompute_sale_price: bool,
) -> CostUpdate {
    let sale_price = (recompute_sale_price && product.margin_percent > Decimal::ZERO)
        .then(|| price_from_margin(unit_value, product.margin_percent));

    CostUpdate {
        product: product.id,
        last_purchase_cost: unit_value,
        average_cost: unit_value,
        sale_price,
    }
}
