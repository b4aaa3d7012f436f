//! Order workflow orchestrator.
//!
//! One call to [`OrderWorkflow::run`] walks
//! `Extracting -> Pricing -> Charging -> Persisting -> Completed`
//! and stops at the first failure. There is no retry loop here; retries are
//! the caller's business and are only safe with an idempotency key.
//!
//! # Charge-then-persist gap
//! The debit and the order append are two separate store operations. If the
//! append fails after a successful debit the account stays charged and the
//! failure is reported as `Persistence { charged: true }`. That is the one
//! outcome needing manual reconciliation, so it is logged at ERROR with
//! everything an operator needs to refund by hand.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use brew_schemas::{format_micros, NewOrder, Order, OrderRequest, SlotBag};
use tracing::{debug, error, info, warn};

use crate::extract::{extract_order_request, ExtractionError};
use crate::ledger::{AccountLedger, DebitOutcome};
use crate::pricing::{PriceTable, PricingError};
use crate::store::OrderStore;

/// Default bound for every store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Extracting,
    Pricing,
    Charging,
    Persisting,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Extracting => "extracting",
            WorkflowState::Pricing => "pricing",
            WorkflowState::Charging => "charging",
            WorkflowState::Persisting => "persisting",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        }
    }
}

/// Why a workflow ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderFailure {
    Extraction(ExtractionError),
    UnknownProduct(String),
    /// Insufficient funds, unknown account, or the ledger did not answer.
    PaymentDeclined,
    /// The store failed. `charged == true` means money moved without an order.
    Persistence { charged: bool, detail: String },
    /// The idempotency key is in flight, failed mid-charge, or was reused
    /// for a different order.
    DuplicateRequest(String),
}

impl OrderFailure {
    /// The state the workflow was in when it failed.
    pub fn failed_in(&self) -> WorkflowState {
        match self {
            OrderFailure::Extraction(_) => WorkflowState::Extracting,
            OrderFailure::UnknownProduct(_) => WorkflowState::Pricing,
            OrderFailure::PaymentDeclined | OrderFailure::DuplicateRequest(_) => {
                WorkflowState::Charging
            }
            OrderFailure::Persistence { charged: true, .. } => WorkflowState::Persisting,
            OrderFailure::Persistence { charged: false, .. } => WorkflowState::Charging,
        }
    }

    /// True when an operator has to reconcile by hand.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(self, OrderFailure::Persistence { charged: true, .. })
    }

    /// Stable machine-readable category.
    pub fn code(&self) -> &'static str {
        match self {
            OrderFailure::Extraction(_) => "EXTRACTION_ERROR",
            OrderFailure::UnknownProduct(_) => "UNKNOWN_PRODUCT",
            OrderFailure::PaymentDeclined => "PAYMENT_DECLINED",
            OrderFailure::Persistence { .. } => "PERSISTENCE_ERROR",
            OrderFailure::DuplicateRequest(_) => "DUPLICATE_REQUEST",
        }
    }
}

impl std::fmt::Display for OrderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderFailure::Extraction(e) => write!(f, "{}", e),
            OrderFailure::UnknownProduct(p) => write!(f, "Unknown coffee type '{}'", p),
            OrderFailure::PaymentDeclined => write!(f, "Payment declined - insufficient funds"),
            OrderFailure::Persistence { detail, .. } => write!(f, "Saving order failed: {}", detail),
            OrderFailure::DuplicateRequest(d) => write!(f, "Duplicate request: {}", d),
        }
    }
}

impl std::error::Error for OrderFailure {}

impl From<ExtractionError> for OrderFailure {
    fn from(e: ExtractionError) -> Self {
        OrderFailure::Extraction(e)
    }
}

impl From<PricingError> for OrderFailure {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::UnknownProduct(p) => OrderFailure::UnknownProduct(p),
            PricingError::AmountOverflow { quantity, .. } => OrderFailure::Extraction(
                ExtractionError::QuantityOutOfRange(quantity.to_string()),
            ),
        }
    }
}

/// Successful end state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub order: Order,
    pub message: String,
    /// True when the order was found via its idempotency key, not newly placed.
    pub replayed: bool,
}

pub struct OrderWorkflow {
    prices: Arc<PriceTable>,
    ledger: Arc<dyn AccountLedger>,
    store: Arc<dyn OrderStore>,
    store_timeout: Duration,
}

impl OrderWorkflow {
    pub fn new(
        prices: Arc<PriceTable>,
        ledger: Arc<dyn AccountLedger>,
        store: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            prices,
            ledger,
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Run the full workflow for one NLU parameter bag.
    pub async fn run(
        &self,
        params: &SlotBag,
        idempotency_key: Option<&str>,
    ) -> Result<OrderConfirmation, OrderFailure> {
        debug!(state = WorkflowState::Extracting.as_str(), "order workflow");
        let req = extract_order_request(params).map_err(|e| {
            warn!(error = %e, "order extraction failed");
            OrderFailure::from(e)
        })?;
        self.place(&req, idempotency_key).await
    }

    /// Run the workflow from an already-typed request (skips extraction).
    pub async fn place(
        &self,
        req: &OrderRequest,
        idempotency_key: Option<&str>,
    ) -> Result<OrderConfirmation, OrderFailure> {
        let key = idempotency_key.map(str::trim).filter(|k| !k.is_empty());

        debug!(state = WorkflowState::Pricing.as_str(), product_id = %req.product_id, "order workflow");
        let amount_micros = self
            .prices
            .amount_for(&req.product_id, req.quantity)
            .map_err(|e| {
                warn!(error = %e, "order pricing failed");
                OrderFailure::from(e)
            })?;

        debug!(state = WorkflowState::Charging.as_str(), amount_micros, "order workflow");
        if let Some(k) = key {
            if let Some(replay) = self.claim_or_replay(k, req).await? {
                return Ok(replay);
            }
        }

        // Dropping this future from here on may leave money moved without an
        // order; the guard logs that for reconciliation.
        let mut guard = ReconcileGuard::new(req, amount_micros, key);
        if let Err(failure) = self.charge(req, amount_micros, key).await {
            guard.settle();
            return Err(failure);
        }
        guard.stage = ChargeStage::Charged;

        debug!(state = WorkflowState::Persisting.as_str(), "order workflow");
        let new = NewOrder {
            product_id: req.product_id.clone(),
            quantity: req.quantity,
            account_id: req.account_id.clone(),
            amount_micros,
            idempotency_key: key.map(str::to_string),
        };

        let appended = self.bounded("order append", self.store.append(&new)).await;
        guard.settle();
        let order = match appended {
            Ok(o) => o,
            Err(e) => {
                let detail = format!("{e:#}");
                log_reconcile(req, amount_micros, key, ChargeStage::Charged, &detail);
                return Err(OrderFailure::Persistence {
                    charged: true,
                    detail,
                });
            }
        };

        info!(
            order_id = %order.order_id,
            account_id = %order.account_id,
            product_id = %order.product_id,
            quantity = order.quantity,
            amount = %format_micros(order.amount_micros),
            state = WorkflowState::Completed.as_str(),
            "order placed"
        );

        Ok(OrderConfirmation {
            message: confirmation_message(&order),
            order,
            replayed: false,
        })
    }

    /// Claim `key`. `Ok(Some(_))` = earlier order replayed, `Ok(None)` = go ahead.
    async fn claim_or_replay(
        &self,
        key: &str,
        req: &OrderRequest,
    ) -> Result<Option<OrderConfirmation>, OrderFailure> {
        let claimed = self
            .bounded("idempotency claim", self.store.claim_idempotency_key(key))
            .await
            .map_err(|e| uncharged_persistence("idempotency claim", e))?;
        if claimed {
            return Ok(None);
        }

        let existing = self
            .bounded("idempotency lookup", self.store.find_by_idempotency_key(key))
            .await
            .map_err(|e| uncharged_persistence("idempotency lookup", e))?;

        match existing {
            Some(order) if order_matches(&order, req) => {
                info!(order_id = %order.order_id, idempotency_key = key, "order replayed");
                Ok(Some(OrderConfirmation {
                    message: confirmation_message(&order),
                    order,
                    replayed: true,
                }))
            }
            Some(order) => {
                warn!(order_id = %order.order_id, idempotency_key = key, "idempotency key reused for a different order");
                Err(OrderFailure::DuplicateRequest(format!(
                    "key '{key}' already used for a different order"
                )))
            }
            None => {
                warn!(idempotency_key = key, "idempotency key claimed without an order");
                Err(OrderFailure::DuplicateRequest(format!(
                    "key '{key}' is in progress or ended without an order"
                )))
            }
        }
    }

    async fn charge(
        &self,
        req: &OrderRequest,
        amount_micros: i64,
        key: Option<&str>,
    ) -> Result<(), OrderFailure> {
        info!(
            account_id = %req.account_id,
            amount = %format_micros(amount_micros),
            ledger = self.ledger.backend_name(),
            "charging account"
        );

        match self
            .bounded("account debit", self.ledger.debit(&req.account_id, amount_micros))
            .await
        {
            Ok(DebitOutcome::Debited) => Ok(()),
            Ok(DebitOutcome::InsufficientFundsOrUnknownAccount) => {
                warn!(account_id = %req.account_id, amount_micros, "payment declined");
                if let Some(k) = key {
                    // Nothing was charged, so the caller may retry under the same key.
                    if let Err(e) = self
                        .bounded("idempotency release", self.store.release_idempotency_key(k))
                        .await
                    {
                        warn!(idempotency_key = k, error = %format!("{e:#}"), "failed to release idempotency key");
                    }
                }
                Err(OrderFailure::PaymentDeclined)
            }
            Err(e) => {
                // Outcome unknown: the claim (if any) is kept so a retry
                // under the same key cannot charge twice.
                log_reconcile(
                    req,
                    amount_micros,
                    key,
                    ChargeStage::Debiting,
                    &format!("{e:#}"),
                );
                Err(OrderFailure::PaymentDeclined)
            }
        }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(r) => r,
            Err(_) => Err(anyhow!("{op} timed out after {:?}", self.store_timeout)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChargeStage {
    /// Debit sent, outcome not yet known.
    Debiting,
    /// Debit committed, order not yet saved.
    Charged,
    Settled,
}

/// Emits the RECONCILE line if the workflow future is dropped between
/// sending the debit and finishing the order append.
struct ReconcileGuard<'a> {
    req: &'a OrderRequest,
    amount_micros: i64,
    key: Option<&'a str>,
    stage: ChargeStage,
}

impl<'a> ReconcileGuard<'a> {
    fn new(req: &'a OrderRequest, amount_micros: i64, key: Option<&'a str>) -> Self {
        Self {
            req,
            amount_micros,
            key,
            stage: ChargeStage::Debiting,
        }
    }

    fn settle(&mut self) {
        self.stage = ChargeStage::Settled;
    }
}

impl Drop for ReconcileGuard<'_> {
    fn drop(&mut self) {
        if self.stage != ChargeStage::Settled {
            log_reconcile(
                self.req,
                self.amount_micros,
                self.key,
                self.stage,
                "request cancelled before the order was saved",
            );
        }
    }
}

fn log_reconcile(
    req: &OrderRequest,
    amount_micros: i64,
    key: Option<&str>,
    stage: ChargeStage,
    detail: &str,
) {
    match stage {
        ChargeStage::Debiting => error!(
            account_id = %req.account_id,
            product_id = %req.product_id,
            quantity = req.quantity,
            amount_micros,
            idempotency_key = key.unwrap_or(""),
            error = detail,
            "RECONCILE: account debit outcome unknown; treating as declined"
        ),
        ChargeStage::Charged | ChargeStage::Settled => error!(
            account_id = %req.account_id,
            product_id = %req.product_id,
            quantity = req.quantity,
            amount_micros,
            idempotency_key = key.unwrap_or(""),
            error = detail,
            "RECONCILE: account charged but order not saved"
        ),
    }
}

fn uncharged_persistence(op: &str, e: anyhow::Error) -> OrderFailure {
    error!(error = %format!("{e:#}"), "{op} failed before charging");
    OrderFailure::Persistence {
        charged: false,
        detail: format!("{e:#}"),
    }
}

fn order_matches(order: &Order, req: &OrderRequest) -> bool {
    order.product_id == req.product_id
        && order.quantity == req.quantity
        && order.account_id == req.account_id
}

/// Customer-facing confirmation text.
pub fn confirmation_message(order: &Order) -> String {
    if order.account_id.is_empty() {
        format!(
            "OK, submitting your order for {} {}",
            order.quantity, order.product_id
        )
    } else {
        format!(
            "OK, submitting your order for {} {} charging account {}",
            order.quantity, order.product_id, order.account_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::store::InMemoryOrderStore;
    use brew_schemas::SlotValue;

    fn params(product: &str, qty: SlotValue, account: &str) -> SlotBag {
        let mut b = SlotBag::new();
        b.insert("coffee".to_string(), SlotValue::Text(product.to_string()));
        b.insert("employeeId".to_string(), SlotValue::Text(account.to_string()));
        b.insert("quantity".to_string(), qty);
        b
    }

    fn workflow(balance: i64) -> (OrderWorkflow, Arc<InMemoryLedger>, Arc<InMemoryOrderStore>) {
        let ledger = Arc::new(InMemoryLedger::with_accounts([("emp1", balance)]));
        let store = Arc::new(InMemoryOrderStore::new());
        let wf = OrderWorkflow::new(
            Arc::new(PriceTable::with_defaults()),
            ledger.clone(),
            store.clone(),
        );
        (wf, ledger, store)
    }

    #[tokio::test]
    async fn unknown_product_never_charges() {
        let (wf, ledger, store) = workflow(10_000_000);
        let err = wf
            .run(&params("mocha", SlotValue::Number(1.0), "emp1"), None)
            .await
            .unwrap_err();
        assert_eq!(err, OrderFailure::UnknownProduct("mocha".to_string()));
        assert_eq!(err.failed_in(), WorkflowState::Pricing);
        assert_eq!(ledger.balance("emp1").unwrap(), Some(10_000_000));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn failure_categories_are_stable() {
        assert_eq!(OrderFailure::PaymentDeclined.code(), "PAYMENT_DECLINED");
        assert_eq!(
            OrderFailure::PaymentDeclined.to_string(),
            "Payment declined - insufficient funds"
        );
        let p = OrderFailure::Persistence {
            charged: true,
            detail: "db down".to_string(),
        };
        assert!(p.needs_reconciliation());
        assert_eq!(p.failed_in(), WorkflowState::Persisting);
    }

    #[test]
    fn confirmation_omits_empty_account() {
        let order = Order {
            order_id: uuid::Uuid::new_v4(),
            product_id: "latte".to_string(),
            quantity: 2,
            account_id: String::new(),
            amount_micros: 7_000_000,
            idempotency_key: None,
            created_at_utc: chrono::Utc::now(),
        };
        assert_eq!(
            confirmation_message(&order),
            "OK, submitting your order for 2 latte"
        );
    }
}
