//! Product price table.
//!
//! Built once at startup and shared read-only (`Arc<PriceTable>`) across all
//! requests. Prices are integer micros; lookups are case-sensitive exact
//! matches on the product identifier.

use std::collections::BTreeMap;

use brew_schemas::MICROS_PER_UNIT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// The product is not on the menu. Nothing may be charged for it.
    UnknownProduct(String),
    /// `unit_price * quantity` does not fit in `i64` micros.
    AmountOverflow { product_id: String, quantity: i64 },
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::UnknownProduct(p) => write!(f, "unknown product '{}'", p),
            PricingError::AmountOverflow {
                product_id,
                quantity,
            } => write!(
                f,
                "order amount overflows for {} x '{}'",
                quantity, product_id
            ),
        }
    }
}

impl std::error::Error for PricingError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    prices: BTreeMap<String, i64>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PriceTable {
    pub fn new(prices: BTreeMap<String, i64>) -> Self {
        Self { prices }
    }

    /// The house menu: latte 3.50, espresso 3.00, long black 3.50.
    pub fn with_defaults() -> Self {
        let prices = [
            ("latte", 3_500_000),
            ("espresso", 3 * MICROS_PER_UNIT),
            ("long black", 3_500_000),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { prices }
    }

    /// Unit price in micros.
    pub fn price(&self, product_id: &str) -> Result<i64, PricingError> {
        self.prices
            .get(product_id)
            .copied()
            .ok_or_else(|| PricingError::UnknownProduct(product_id.to_string()))
    }

    /// `unit_price(product_id) * quantity`, exact.
    pub fn amount_for(&self, product_id: &str, quantity: i64) -> Result<i64, PricingError> {
        let unit = self.price(product_id)?;
        unit.checked_mul(quantity)
            .ok_or_else(|| PricingError::AmountOverflow {
                product_id: product_id.to_string(),
                quantity,
            })
    }

    pub fn products(&self) -> impl Iterator<Item = (&str, i64)> {
        self.prices.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_menu_prices() {
        let t = PriceTable::with_defaults();
        assert_eq!(t.price("espresso"), Ok(3_000_000));
        assert_eq!(t.price("latte"), Ok(3_500_000));
        assert_eq!(t.price("long black"), Ok(3_500_000));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn lookup_is_case_sensitive_exact() {
        let t = PriceTable::with_defaults();
        assert_eq!(
            t.price("Espresso"),
            Err(PricingError::UnknownProduct("Espresso".to_string()))
        );
        assert!(t.price("espresso ").is_err());
        assert!(t.price("").is_err());
    }

    #[test]
    fn amount_is_exact_for_every_product() {
        let t = PriceTable::with_defaults();
        for (product, unit) in t.products() {
            for qty in 1..=25 {
                assert_eq!(t.amount_for(product, qty), Ok(unit * qty), "{product} x {qty}");
            }
        }
    }

    #[test]
    fn overflow_is_an_error_not_a_wrap() {
        let t = PriceTable::with_defaults();
        assert!(matches!(
            t.amount_for("latte", i64::MAX),
            Err(PricingError::AmountOverflow { .. })
        ));
    }
}
