//! Postgres-backed implementations of the order-path store traits.

use anyhow::Result;
use async_trait::async_trait;
use brew_order::{AccountLedger, DebitOutcome, OrderStore};
use brew_schemas::{NewOrder, Order};
use sqlx::PgPool;

/// Ledger over the `accounts` table. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountLedger for PgLedger {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn debit(&self, account_id: &str, amount_micros: i64) -> Result<DebitOutcome> {
        crate::debit_account(&self.pool, account_id, amount_micros).await
    }
}

/// Order store over the `orders` and `order_idempotency` tables.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn append(&self, order: &NewOrder) -> Result<Order> {
        crate::insert_order(&self.pool, order).await
    }

    async fn claim_idempotency_key(&self, key: &str) -> Result<bool> {
        crate::claim_idempotency_key(&self.pool, key).await
    }

    async fn release_idempotency_key(&self, key: &str) -> Result<()> {
        crate::release_idempotency_key(&self.pool, key).await
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        crate::fetch_order_by_idempotency_key(&self.pool, key).await
    }
}
