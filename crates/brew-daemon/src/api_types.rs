//! Response types for the JSON endpoints and SSE payloads.
//!
//! `Serialize + Deserialize` so tests can decode them. No business logic here.

use brew_schemas::{format_micros, Order};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    /// Backing store in use: "postgres" | "memory".
    pub store: String,
}

// ---------------------------------------------------------------------------
// /v1/menu
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub product_id: String,
    /// Decimal string, e.g. "3.50".
    pub price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuResponse {
    pub products: Vec<MenuItem>,
}

// ---------------------------------------------------------------------------
// SSE `order_placed`
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub product_id: String,
    pub quantity: i64,
    pub account_id: String,
    pub amount: String,
    pub replayed: bool,
}

impl OrderPlacedEvent {
    pub fn from_order(order: &Order, replayed: bool) -> Self {
        Self {
            order_id: order.order_id,
            product_id: order.product_id.clone(),
            quantity: order.quantity,
            account_id: order.account_id.clone(),
            amount: format_micros(order.amount_micros),
            replayed,
        }
    }
}
