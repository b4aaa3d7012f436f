//! brew-order
//!
//! Order-fulfillment and payment core: slot extraction, price lookup,
//! conditional account debit and order persistence, sequenced by
//! [`workflow::OrderWorkflow`].
//!
//! Backing stores plug in through [`ledger::AccountLedger`] and
//! [`store::OrderStore`]. This crate ships in-memory implementations of both;
//! Postgres implementations live in `brew-db`.

pub mod extract;
pub mod ledger;
pub mod pricing;
pub mod store;
pub mod workflow;

pub use extract::{extract_order_request, normalize_quantity, ExtractionError};
pub use ledger::{AccountLedger, DebitOutcome, InMemoryLedger};
pub use pricing::{PriceTable, PricingError};
pub use store::{InMemoryOrderStore, OrderStore};
pub use workflow::{OrderConfirmation, OrderFailure, OrderWorkflow, WorkflowState};
