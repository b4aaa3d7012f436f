//! Order store boundary.
//!
//! Orders are append-only: nothing in this workspace updates or deletes an
//! order once written. Idempotency keys are claimed before the debit so a
//! retried request carrying the same key can never charge twice.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use brew_schemas::{NewOrder, Order};
use chrono::Utc;
use uuid::Uuid;

#[async_trait]
pub trait OrderStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Append a new immutable order. The store assigns `order_id`.
    ///
    /// If `order.idempotency_key` is set, the order is bound to that claim.
    async fn append(&self, order: &NewOrder) -> Result<Order>;

    /// Insert-if-absent. `true` = newly claimed, `false` = already claimed.
    async fn claim_idempotency_key(&self, key: &str) -> Result<bool>;

    /// Drop a claim that never got an order (declined before charging).
    async fn release_idempotency_key(&self, key: &str) -> Result<()>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>>;
}

#[derive(Debug, Default)]
struct Inner {
    orders: Vec<Order>,
    /// key -> order bound to it (None while in flight).
    claims: BTreeMap<String, Option<Uuid>>,
}

/// In-process order store for tests and the `memory` backend.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: Mutex<Inner>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all orders in append order.
    pub fn orders(&self) -> Result<Vec<Order>> {
        let g = self.lock()?;
        Ok(g.orders.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.orders.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("in-memory order store lock poisoned"))
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, order: &NewOrder) -> Result<Order> {
        let mut g = self.lock()?;
        let stored = Order::from_new(Uuid::new_v4(), order, Utc::now());

        if let Some(key) = &order.idempotency_key {
            match g.claims.get(key) {
                Some(None) => {}
                Some(Some(existing)) => {
                    return Err(anyhow!(
                        "idempotency key already bound to order {existing}"
                    ))
                }
                None => return Err(anyhow!("idempotency key was never claimed")),
            }
            g.claims.insert(key.clone(), Some(stored.order_id));
        }

        g.orders.push(stored.clone());
        Ok(stored)
    }

    async fn claim_idempotency_key(&self, key: &str) -> Result<bool> {
        let mut g = self.lock()?;
        if g.claims.contains_key(key) {
            return Ok(false);
        }
        g.claims.insert(key.to_string(), None);
        Ok(true)
    }

    async fn release_idempotency_key(&self, key: &str) -> Result<()> {
        let mut g = self.lock()?;
        // Never release a key that already owns an order.
        if let Some(None) = g.claims.get(key) {
            g.claims.remove(key);
        }
        Ok(())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        let g = self.lock()?;
        let Some(Some(order_id)) = g.claims.get(key) else {
            return Ok(None);
        };
        Ok(g.orders.iter().find(|o| o.order_id == *order_id).cloned())
    }
}
