use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use brew_order::DebitOutcome;
use brew_schemas::{Account, NewOrder, Order};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub mod store;

pub use store::{PgLedger, PgOrderStore};

pub const ENV_DB_URL: &str = "BREW_DATABASE_URL";

/// Connect to Postgres using BREW_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 10, Duration::from_secs(5)).await
}

/// Connect with an explicit pool size and acquire timeout.
pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_orders_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Provision an account, or reset its balance if it exists.
///
/// Operator tooling only. The order path never calls this.
pub async fn open_account(pool: &PgPool, account_id: &str, balance_micros: i64) -> Result<()> {
    if balance_micros < 0 {
        return Err(anyhow!("open_account: balance must be >= 0"));
    }

    sqlx::query(
        r#"
        insert into accounts (account_id, balance_micros)
        values ($1, $2)
        on conflict (account_id) do update
        set balance_micros = excluded.balance_micros,
            updated_at_utc = now()
        "#,
    )
    .bind(account_id)
    .bind(balance_micros)
    .execute(pool)
    .await
    .context("open_account failed")?;

    Ok(())
}

pub async fn fetch_account(pool: &PgPool, account_id: &str) -> Result<Option<Account>> {
    let row = sqlx::query(
        r#"
        select account_id, balance_micros
        from accounts
        where account_id = $1
        "#,
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await
    .context("fetch_account failed")?;

    match row {
        Some(r) => Ok(Some(Account {
            account_id: r.try_get("account_id")?,
            balance_micros: r.try_get("balance_micros")?,
        })),
        None => Ok(None),
    }
}

/// Conditional debit in ONE statement: decrement only if the account exists
/// and its balance is strictly greater than the amount.
///
/// Exactly one modified row = debited. Zero rows = declined (unknown account
/// and insufficient funds are indistinguishable).
pub async fn debit_account(pool: &PgPool, account_id: &str, amount_micros: i64) -> Result<DebitOutcome> {
    let res = sqlx::query(
        r#"
        update accounts
        set balance_micros = balance_micros - $2,
            updated_at_utc = now()
        where account_id = $1
          and balance_micros > $2
        "#,
    )
    .bind(account_id)
    .bind(amount_micros)
    .execute(pool)
    .await
    .context("debit_account update failed")?;

    match res.rows_affected() {
        1 => Ok(DebitOutcome::Debited),
        0 => Ok(DebitOutcome::InsufficientFundsOrUnknownAccount),
        n => Err(anyhow!("debit_account modified {n} rows; expected 0 or 1")),
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Append an order. When it carries an idempotency key, binding the claim to
/// the new order happens in the same transaction as the insert.
pub async fn insert_order(pool: &PgPool, order: &NewOrder) -> Result<Order> {
    let order_id = Uuid::new_v4();
    let mut tx = pool.begin().await.context("insert_order begin failed")?;

    let (created_at_utc,): (DateTime<Utc>,) = sqlx::query_as::<_, (DateTime<Utc>,)>(
        r#"
        insert into orders (
          order_id, product_id, quantity, account_id, amount_micros, idempotency_key
        ) values (
          $1, $2, $3, $4, $5, $6
        )
        returning created_at_utc
        "#,
    )
    .bind(order_id)
    .bind(&order.product_id)
    .bind(order.quantity)
    .bind(&order.account_id)
    .bind(order.amount_micros)
    .bind(&order.idempotency_key)
    .fetch_one(&mut *tx)
    .await
    .context("insert_order insert failed")?;

    if let Some(key) = &order.idempotency_key {
        let res = sqlx::query(
            r#"
            update order_idempotency
            set order_id = $2
            where idempotency_key = $1
              and order_id is null
            "#,
        )
        .bind(key)
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .context("insert_order claim bind failed")?;

        if res.rows_affected() != 1 {
            // Dropping `tx` rolls the insert back.
            return Err(anyhow!(
                "insert_order: idempotency key '{key}' is not an open claim"
            ));
        }
    }

    tx.commit().await.context("insert_order commit failed")?;

    Ok(Order::from_new(order_id, order, created_at_utc))
}

pub async fn fetch_order(pool: &PgPool, order_id: Uuid) -> Result<Option<Order>> {
    let row = sqlx::query(
        r#"
        select order_id, product_id, quantity, account_id, amount_micros,
               idempotency_key, created_at_utc
        from orders
        where order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await
    .context("fetch_order failed")?;

    row.as_ref().map(order_from_row).transpose()
}

/// Orders for one account, oldest first.
pub async fn fetch_orders_for_account(pool: &PgPool, account_id: &str) -> Result<Vec<Order>> {
    let rows = sqlx::query(
        r#"
        select order_id, product_id, quantity, account_id, amount_micros,
               idempotency_key, created_at_utc
        from orders
        where account_id = $1
        order by created_at_utc asc, order_id asc
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await
    .context("fetch_orders_for_account failed")?;

    rows.iter().map(order_from_row).collect()
}

fn order_from_row(r: &PgRow) -> Result<Order> {
    Ok(Order {
        order_id: r.try_get("order_id")?,
        product_id: r.try_get("product_id")?,
        quantity: r.try_get("quantity")?,
        account_id: r.try_get("account_id")?,
        amount_micros: r.try_get("amount_micros")?,
        idempotency_key: r.try_get("idempotency_key")?,
        created_at_utc: r.try_get("created_at_utc")?,
    })
}

// ---------------------------------------------------------------------------
// Idempotency claims
// ---------------------------------------------------------------------------

/// Insert-if-absent. Returns true iff this call created the claim.
pub async fn claim_idempotency_key(pool: &PgPool, key: &str) -> Result<bool> {
    let res = sqlx::query(
        r#"
        insert into order_idempotency (idempotency_key)
        values ($1)
        on conflict (idempotency_key) do nothing
        "#,
    )
    .bind(key)
    .execute(pool)
    .await
    .context("claim_idempotency_key failed")?;

    Ok(res.rows_affected() == 1)
}

/// Remove an open claim. A claim already bound to an order is never removed.
pub async fn release_idempotency_key(pool: &PgPool, key: &str) -> Result<()> {
    sqlx::query(
        r#"
        delete from order_idempotency
        where idempotency_key = $1
          and order_id is null
        "#,
    )
    .bind(key)
    .execute(pool)
    .await
    .context("release_idempotency_key failed")?;

    Ok(())
}

pub async fn fetch_order_by_idempotency_key(pool: &PgPool, key: &str) -> Result<Option<Order>> {
    let row = sqlx::query(
        r#"
        select o.order_id, o.product_id, o.quantity, o.account_id, o.amount_micros,
               o.idempotency_key, o.created_at_utc
        from order_idempotency c
        join orders o on o.order_id = c.order_id
        where c.idempotency_key = $1
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await
    .context("fetch_order_by_idempotency_key failed")?;

    row.as_ref().map(order_from_row).transpose()
}

/// Claims with no order attached, older than `older_than_secs`.
///
/// These are requests that died between claim and append: either declined
/// without a successful release, or charged without an order. Operators
/// reconcile them against the account ledger.
pub async fn stale_open_claims(pool: &PgPool, older_than_secs: i64) -> Result<Vec<(String, DateTime<Utc>)>> {
    if older_than_secs < 0 {
        return Err(anyhow!("stale_open_claims: older_than_secs must be >= 0"));
    }

    let rows = sqlx::query(
        r#"
        select idempotency_key, claimed_at_utc
        from order_idempotency
        where order_id is null
          and claimed_at_utc < now() - make_interval(secs => $1)
        order by claimed_at_utc asc
        "#,
    )
    .bind(older_than_secs as f64)
    .fetch_all(pool)
    .await
    .context("stale_open_claims failed")?;

    rows.iter()
        .map(|r| -> Result<(String, DateTime<Utc>)> {
            Ok((r.try_get("idempotency_key")?, r.try_get("claimed_at_utc")?))
        })
        .collect()
}
