//! Account ledger boundary.
//!
//! A debit is one atomic conditional decrement in the backing store:
//! it applies only if the account exists AND `balance > amount`. Callers
//! never read the balance first; the store's atomicity is the only
//! concurrency control.
//!
//! There is no credit operation on this trait.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Result of a conditional debit that reached the store.
///
/// Unknown account and insufficient funds are the same outcome so callers
/// cannot probe which accounts exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Exactly one account row was decremented.
    Debited,
    /// Zero rows matched the condition.
    InsufficientFundsOrUnknownAccount,
}

impl DebitOutcome {
    pub fn is_debited(&self) -> bool {
        matches!(self, DebitOutcome::Debited)
    }
}

#[async_trait]
pub trait AccountLedger: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Conditionally decrement `account_id` by `amount_micros`.
    ///
    /// `Err` means the store could not be reached or answered abnormally;
    /// the caller must not assume the debit did or did not apply.
    async fn debit(&self, account_id: &str, amount_micros: i64) -> Result<DebitOutcome>;
}

/// In-process ledger for tests and the `memory` store backend.
///
/// The check and the decrement happen under one lock acquisition, which is
/// this store's atomic conditional-update primitive.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: Mutex<BTreeMap<String, i64>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let balances = accounts.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            balances: Mutex::new(balances),
        }
    }

    /// Provision (or reset) an account. Out-of-band; not part of the order path.
    pub fn open_account(&self, account_id: impl Into<String>, balance_micros: i64) -> Result<()> {
        let mut g = self
            .balances
            .lock()
            .map_err(|_| anyhow!("in-memory ledger lock poisoned"))?;
        g.insert(account_id.into(), balance_micros);
        Ok(())
    }

    pub fn balance(&self, account_id: &str) -> Result<Option<i64>> {
        let g = self
            .balances
            .lock()
            .map_err(|_| anyhow!("in-memory ledger lock poisoned"))?;
        Ok(g.get(account_id).copied())
    }
}

#[async_trait]
impl AccountLedger for InMemoryLedger {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn debit(&self, account_id: &str, amount_micros: i64) -> Result<DebitOutcome> {
        let mut g = self
            .balances
            .lock()
            .map_err(|_| anyhow!("in-memory ledger lock poisoned"))?;

        match g.get_mut(account_id) {
            Some(balance) if *balance > amount_micros => {
                *balance -= amount_micros;
                Ok(DebitOutcome::Debited)
            }
            _ => Ok(DebitOutcome::InsufficientFundsOrUnknownAccount),
        }
    }
}
