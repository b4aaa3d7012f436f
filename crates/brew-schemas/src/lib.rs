use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub mod money;

pub use money::{format_micros, parse_decimal_micros, MoneyParseError, MICROS_PER_UNIT};

// ---------------------------------------------------------------------------
// NLU slot values
// ---------------------------------------------------------------------------

/// A single slot value as reported by the NLU service.
///
/// The upstream protocol carries slot values as a loosely-typed struct value.
/// Only the two encodings the order path understands get their own variant;
/// everything else (bool, null, list, nested struct) collapses into `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
    Number(f64),
    Text(String),
    Other,
}

impl SlotValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Number(n) => match n.as_f64() {
                Some(f) => SlotValue::Number(f),
                None => SlotValue::Other,
            },
            Value::String(s) => SlotValue::Text(s.clone()),
            _ => SlotValue::Other,
        }
    }

    /// Short tag used in log lines and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SlotValue::Number(_) => "number",
            SlotValue::Text(_) => "text",
            SlotValue::Other => "other",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SlotValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Slot name -> value, as extracted from one detect-intent result.
pub type SlotBag = BTreeMap<String, SlotValue>;

/// Build a [`SlotBag`] from a JSON object. Non-object input yields an empty bag.
pub fn slot_bag_from_json(v: &Value) -> SlotBag {
    match v {
        Value::Object(map) => map
            .iter()
            .map(|(k, vv)| (k.clone(), SlotValue::from_json(vv)))
            .collect(),
        _ => SlotBag::new(),
    }
}

/// Parsed result of one intent-detection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedIntent {
    /// Non-empty while the dialog still needs input from the customer.
    pub fulfillment_text: String,
    pub all_required_params_present: bool,
    pub parameters: SlotBag,
}

impl DetectedIntent {
    /// True when the utterance fully specifies an order and the workflow should run.
    pub fn is_order_ready(&self) -> bool {
        self.fulfillment_text.is_empty() && self.all_required_params_present
    }
}

// ---------------------------------------------------------------------------
// Orders and accounts
// ---------------------------------------------------------------------------

/// Strongly-typed order request. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub product_id: String,
    pub quantity: i64,
    pub account_id: String,
}

/// An order about to be appended. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub product_id: String,
    pub quantity: i64,
    pub account_id: String,
    pub amount_micros: i64,
    pub idempotency_key: Option<String>,
}

/// A persisted, immutable order record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub product_id: String,
    pub quantity: i64,
    pub account_id: String,
    pub amount_micros: i64,
    pub idempotency_key: Option<String>,
    pub created_at_utc: DateTime<Utc>,
}

impl Order {
    pub fn from_new(order_id: Uuid, new: &NewOrder, created_at_utc: DateTime<Utc>) -> Self {
        Self {
            order_id,
            product_id: new.product_id.clone(),
            quantity: new.quantity,
            account_id: new.account_id.clone(),
            amount_micros: new.amount_micros,
            idempotency_key: new.idempotency_key.clone(),
            created_at_utc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub balance_micros: i64,
}
