//! Slot bag -> [`OrderRequest`].
//!
//! The only job here is type normalization. Empty product or account values
//! pass straight through: the price table and the ledger are the real
//! validators for those.

use brew_schemas::{OrderRequest, SlotBag, SlotValue};

/// Product slot names, in lookup order.
pub const PRODUCT_SLOTS: &[&str] = &["coffee", "product"];
/// Account slot names, in lookup order.
pub const ACCOUNT_SLOTS: &[&str] = &["employeeId", "accountId"];
pub const QUANTITY_SLOT: &str = "quantity";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The slot is present with (or missing into) an encoding we do not accept.
    UnrecognizedFieldType { field: String, kind: String },
    /// Not a positive whole number (e.g. "abc", 2.5, 0, -1).
    InvalidQuantity(String),
    QuantityOutOfRange(String),
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::UnrecognizedFieldType { field, kind } => {
                write!(f, "unrecognised type for {} field: {}", field, kind)
            }
            ExtractionError::InvalidQuantity(raw) => write!(f, "invalid quantity '{}'", raw),
            ExtractionError::QuantityOutOfRange(raw) => {
                write!(f, "quantity out of range '{}'", raw)
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

pub fn extract_order_request(params: &SlotBag) -> Result<OrderRequest, ExtractionError> {
    let quantity = match params.get(QUANTITY_SLOT) {
        Some(v) => normalize_quantity(v)?,
        None => {
            return Err(ExtractionError::UnrecognizedFieldType {
                field: QUANTITY_SLOT.to_string(),
                kind: "missing".to_string(),
            })
        }
    };

    Ok(OrderRequest {
        product_id: first_text(params, PRODUCT_SLOTS),
        quantity,
        account_id: first_text(params, ACCOUNT_SLOTS),
    })
}

/// Number -> whole value; Text -> base-10 integer; Other -> error.
pub fn normalize_quantity(v: &SlotValue) -> Result<i64, ExtractionError> {
    let qty = match v {
        SlotValue::Number(n) => {
            let n = *n;
            if !n.is_finite() || n.fract() != 0.0 {
                return Err(ExtractionError::InvalidQuantity(n.to_string()));
            }
            // i64::MAX as f64 rounds up to 2^63, so `>=` is the correct bound.
            if n >= i64::MAX as f64 || n < i64::MIN as f64 {
                return Err(ExtractionError::QuantityOutOfRange(n.to_string()));
            }
            n as i64
        }
        SlotValue::Text(s) => {
            let t = s.trim();
            match t.parse::<i64>() {
                Ok(q) => q,
                Err(e) => {
                    return Err(match e.kind() {
                        std::num::IntErrorKind::PosOverflow
                        | std::num::IntErrorKind::NegOverflow => {
                            ExtractionError::QuantityOutOfRange(t.to_string())
                        }
                        _ => ExtractionError::InvalidQuantity(t.to_string()),
                    })
                }
            }
        }
        SlotValue::Other => {
            return Err(ExtractionError::UnrecognizedFieldType {
                field: QUANTITY_SLOT.to_string(),
                kind: v.kind().to_string(),
            })
        }
    };

    if qty <= 0 {
        return Err(ExtractionError::InvalidQuantity(qty.to_string()));
    }
    Ok(qty)
}

fn first_text(params: &SlotBag, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|n| params.get(*n).and_then(SlotValue::as_text))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(pairs: &[(&str, SlotValue)]) -> SlotBag {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn text(s: &str) -> SlotValue {
        SlotValue::Text(s.to_string())
    }

    #[test]
    fn number_and_text_encodings_agree() {
        assert_eq!(normalize_quantity(&SlotValue::Number(3.0)), Ok(3));
        assert_eq!(normalize_quantity(&text("3")), Ok(3));
        assert_eq!(normalize_quantity(&text(" 3 ")), Ok(3));
    }

    #[test]
    fn other_encodings_are_rejected() {
        assert!(matches!(
            normalize_quantity(&SlotValue::Other),
            Err(ExtractionError::UnrecognizedFieldType { .. })
        ));
        assert_eq!(
            normalize_quantity(&text("abc")),
            Err(ExtractionError::InvalidQuantity("abc".to_string()))
        );
        assert!(normalize_quantity(&text("")).is_err());
        assert!(normalize_quantity(&text("3.0")).is_err());
    }

    #[test]
    fn non_positive_and_fractional_are_rejected() {
        assert!(normalize_quantity(&SlotValue::Number(0.0)).is_err());
        assert!(normalize_quantity(&SlotValue::Number(-2.0)).is_err());
        assert!(normalize_quantity(&SlotValue::Number(2.5)).is_err());
        assert!(normalize_quantity(&SlotValue::Number(f64::NAN)).is_err());
        assert!(normalize_quantity(&text("-1")).is_err());
    }

    #[test]
    fn huge_values_are_out_of_range() {
        assert!(matches!(
            normalize_quantity(&SlotValue::Number(1e30)),
            Err(ExtractionError::QuantityOutOfRange(_))
        ));
        assert!(matches!(
            normalize_quantity(&text("99999999999999999999")),
            Err(ExtractionError::QuantityOutOfRange(_))
        ));
    }

    #[test]
    fn extracts_with_primary_slot_names() {
        let params = bag(&[
            ("coffee", text("espresso")),
            ("employeeId", text("emp1")),
            ("quantity", SlotValue::Number(2.0)),
        ]);
        let req = extract_order_request(&params).unwrap();
        assert_eq!(
            req,
            OrderRequest {
                product_id: "espresso".to_string(),
                quantity: 2,
                account_id: "emp1".to_string(),
            }
        );
    }

    #[test]
    fn falls_back_to_generic_slot_names() {
        let params = bag(&[
            ("coffee", text("")),
            ("product", text("latte")),
            ("accountId", text("acct-9")),
            ("quantity", text("1")),
        ]);
        let req = extract_order_request(&params).unwrap();
        assert_eq!(req.product_id, "latte");
        assert_eq!(req.account_id, "acct-9");
    }

    #[test]
    fn missing_product_and_account_pass_through_empty() {
        let params = bag(&[("quantity", text("1")), ("coffee", SlotValue::Number(5.0))]);
        let req = extract_order_request(&params).unwrap();
        assert_eq!(req.product_id, "");
        assert_eq!(req.account_id, "");
    }

    #[test]
    fn missing_quantity_is_an_extraction_error() {
        let params = bag(&[("coffee", text("latte"))]);
        assert!(matches!(
            extract_order_request(&params),
            Err(ExtractionError::UnrecognizedFieldType { .. })
        ));
    }
}
