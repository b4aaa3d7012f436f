//! Reconciliation logging when money may have moved without an order.
//!
//! GREEN when:
//! - dropping the workflow future mid-append (client went away) leaves the
//!   debit in place and emits a `RECONCILE:` ERROR line,
//! - a debit that errors or times out emits a `RECONCILE:` line naming the
//!   account, product and amount,
//! - a completed order emits no `RECONCILE:` line.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use brew_order::{
    AccountLedger, DebitOutcome, InMemoryLedger, InMemoryOrderStore, OrderFailure, OrderStore,
    OrderWorkflow, PriceTable,
};
use brew_schemas::{slot_bag_from_json, NewOrder, Order, SlotBag};
use serde_json::json;

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

/// Append never finishes inside the test window.
struct SlowStore;

#[async_trait]
impl OrderStore for SlowStore {
    fn backend_name(&self) -> &'static str {
        "slow"
    }
    async fn append(&self, _order: &NewOrder) -> Result<Order> {
        tokio::time::sleep(Duration::from_secs(3)).await;
        anyhow::bail!("append should have been cancelled")
    }
    async fn claim_idempotency_key(&self, _key: &str) -> Result<bool> {
        Ok(true)
    }
    async fn release_idempotency_key(&self, _key: &str) -> Result<()> {
        Ok(())
    }
    async fn find_by_idempotency_key(&self, _key: &str) -> Result<Option<Order>> {
        Ok(None)
    }
}

struct HangingLedger;

#[async_trait]
impl AccountLedger for HangingLedger {
    fn backend_name(&self) -> &'static str {
        "hanging"
    }
    async fn debit(&self, _account_id: &str, _amount_micros: i64) -> Result<DebitOutcome> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(DebitOutcome::Debited)
    }
}

fn params() -> SlotBag {
    slot_bag_from_json(&json!({"coffee": "espresso", "employeeId": "emp1", "quantity": 2}))
}

#[tokio::test]
async fn cancelled_append_keeps_debit_and_logs_reconcile() {
    let (logs, _guard) = capture_logs();
    let ledger = Arc::new(InMemoryLedger::with_accounts([("emp1", 10_000_000)]));
    let wf = OrderWorkflow::new(
        Arc::new(PriceTable::with_defaults()),
        ledger.clone(),
        Arc::new(SlowStore),
    );

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        wf.run(&params(), Some("req-cancelled")),
    )
    .await;

    assert!(outcome.is_err(), "workflow should have been cut off mid-append");
    assert_eq!(ledger.balance("emp1").unwrap(), Some(4_000_000));

    let text = logs.text();
    assert!(
        text.contains("RECONCILE: account charged but order not saved"),
        "logs={text}"
    );
    assert!(text.contains("emp1"), "logs={text}");
    assert!(text.contains("amount_micros=6000000"), "logs={text}");
    assert!(text.contains("req-cancelled"), "logs={text}");
    assert_eq!(text.matches("RECONCILE").count(), 1, "logs={text}");
}

#[tokio::test]
async fn cancelled_debit_logs_unknown_outcome() {
    let (logs, _guard) = capture_logs();
    let wf = OrderWorkflow::new(
        Arc::new(PriceTable::with_defaults()),
        Arc::new(HangingLedger),
        Arc::new(InMemoryOrderStore::new()),
    );

    let outcome = tokio::time::timeout(Duration::from_millis(100), wf.run(&params(), None)).await;

    assert!(outcome.is_err());
    let text = logs.text();
    assert!(
        text.contains("RECONCILE: account debit outcome unknown"),
        "logs={text}"
    );
}

#[tokio::test]
async fn debit_timeout_logs_reconcile_with_order_fields() {
    let (logs, _guard) = capture_logs();
    let wf = OrderWorkflow::new(
        Arc::new(PriceTable::with_defaults()),
        Arc::new(HangingLedger),
        Arc::new(InMemoryOrderStore::new()),
    )
    .with_store_timeout(Duration::from_millis(50));

    let err = wf.run(&params(), None).await.unwrap_err();

    assert_eq!(err, OrderFailure::PaymentDeclined);
    let text = logs.text();
    assert!(
        text.contains("RECONCILE: account debit outcome unknown; treating as declined"),
        "logs={text}"
    );
    assert!(text.contains("account_id=emp1"), "logs={text}");
    assert!(text.contains("product_id=espresso"), "logs={text}");
    assert!(text.contains("quantity=2"), "logs={text}");
    assert!(text.contains("timed out"), "logs={text}");
    assert_eq!(text.matches("RECONCILE").count(), 1, "logs={text}");
}

#[tokio::test]
async fn completed_order_logs_no_reconcile() {
    let (logs, _guard) = capture_logs();
    let store = Arc::new(InMemoryOrderStore::new());
    let wf = OrderWorkflow::new(
        Arc::new(PriceTable::with_defaults()),
        Arc::new(InMemoryLedger::with_accounts([("emp1", 10_000_000)])),
        store.clone(),
    );

    let done = wf.run(&params(), None).await.unwrap();

    assert_eq!(done.order.amount_micros, 6_000_000);
    assert_eq!(store.len().unwrap(), 1);
    let text = logs.text();
    assert!(!text.contains("RECONCILE"), "logs={text}");
}
