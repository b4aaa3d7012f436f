//! Idempotency key behaviour: one debit and one order per key.

use std::sync::Arc;

use brew_order::{InMemoryLedger, InMemoryOrderStore, OrderFailure, OrderWorkflow, PriceTable};
use brew_schemas::{slot_bag_from_json, SlotBag};
use serde_json::json;

fn setup(balance: i64) -> (OrderWorkflow, Arc<InMemoryLedger>, Arc<InMemoryOrderStore>) {
    let ledger = Arc::new(InMemoryLedger::with_accounts([("emp1", balance)]));
    let store = Arc::new(InMemoryOrderStore::new());
    let wf = OrderWorkflow::new(
        Arc::new(PriceTable::with_defaults()),
        ledger.clone(),
        store.clone(),
    );
    (wf, ledger, store)
}

fn latte(qty: i64) -> SlotBag {
    slot_bag_from_json(&json!({"coffee": "latte", "employeeId": "emp1", "quantity": qty}))
}

#[tokio::test]
async fn same_key_replays_the_first_order() {
    let (wf, ledger, store) = setup(10_000_000);

    let first = wf.run(&latte(1), Some("req-1")).await.unwrap();
    let second = wf.run(&latte(1), Some("req-1")).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.order.order_id, second.order.order_id);
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(ledger.balance("emp1").unwrap(), Some(6_500_000));
}

#[tokio::test]
async fn key_reused_for_different_order_is_refused() {
    let (wf, ledger, store) = setup(10_000_000);

    wf.run(&latte(1), Some("req-2")).await.unwrap();
    let err = wf.run(&latte(2), Some("req-2")).await.unwrap_err();

    assert!(matches!(err, OrderFailure::DuplicateRequest(_)));
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(ledger.balance("emp1").unwrap(), Some(6_500_000));
}

#[tokio::test]
async fn declined_key_can_be_retried() {
    let (wf, ledger, store) = setup(3_000_000);

    let err = wf.run(&latte(1), Some("req-3")).await.unwrap_err();
    assert_eq!(err, OrderFailure::PaymentDeclined);

    // Top up out of band, then retry with the same key.
    ledger.open_account("emp1", 10_000_000).unwrap();
    let done = wf.run(&latte(1), Some("req-3")).await.unwrap();
    assert!(!done.replayed);
    assert_eq!(store.len().unwrap(), 1);
}

#[tokio::test]
async fn blank_key_behaves_like_no_key() {
    let (wf, _ledger, store) = setup(10_000_000);

    wf.run(&latte(1), Some("  ")).await.unwrap();
    wf.run(&latte(1), Some("")).await.unwrap();

    let orders = store.orders().unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.idempotency_key.is_none()));
}
