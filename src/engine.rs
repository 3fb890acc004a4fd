use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::{Account, TransactionRecord};

/// Pure in-memory balance map and idempotency ledger.
///
/// `WalletEngine` has no knowledge of durability: it trusts its caller
/// ([`crate::persistent_engine::PersistentEngine`]) to have already made a
/// transition durable before asking it to mutate in-memory state, and to
/// have already validated its caller's input (amount > 0, non-empty ids).
/// Two operations on the same account are only ever interleaved safely
/// because callers serialize access behind a lock.
pub struct WalletEngine {
    balances: HashMap<String, Decimal>,
    ledger: HashMap<String, TransactionRecord>,
}

impl WalletEngine {
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
            ledger: HashMap::new(),
        }
    }

    /// Look up the cached outcome of a previously seen `transaction_id`.
    pub fn lookup(&self, transaction_id: &str) -> Option<TransactionRecord> {
        self.ledger.get(transaction_id).cloned()
    }

    /// Record the latest known state of a transaction_id in the in-memory
    /// idempotency cache. Does not touch the balance map.
    pub fn remember(&mut self, record: TransactionRecord) {
        self.ledger.insert(record.transaction_id.clone(), record);
    }

    pub fn get_balance(&self, account_id: &str) -> Decimal {
        self.balances.get(account_id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Credit `amount` to `account_id`, creating the account at zero first
    /// if it doesn't exist yet. Always succeeds; returns the new balance.
    pub fn credit(&mut self, account_id: &str, amount: Decimal) -> Decimal {
        let balance = self.balances.entry(account_id.to_string()).or_insert(Decimal::ZERO);
        *balance += amount;
        *balance
    }

    /// Debit `amount` from `account_id` if the current balance covers it.
    /// An account that doesn't exist is treated as balance zero. Returns
    /// `None` (leaving the balance untouched) on insufficient funds.
    pub fn debit_if_sufficient(&mut self, account_id: &str, amount: Decimal) -> Option<Decimal> {
        let current = self.get_balance(account_id);
        if current < amount {
            return None;
        }
        let balance = self.balances.entry(account_id.to_string()).or_insert(Decimal::ZERO);
        *balance -= amount;
        Some(*balance)
    }

    /// Directly set an account's balance. Used only by recovery, which
    /// rebuilds balances from the ledger rather than replaying deposits and
    /// withdrawals one at a time.
    pub fn set_balance(&mut self, account_id: &str, balance: Decimal) {
        self.balances.insert(account_id.to_string(), balance);
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.balances
            .iter()
            .map(|(id, balance)| Account::new(id.clone(), *balance))
            .collect()
    }

    pub fn balances(&self) -> &HashMap<String, Decimal> {
        &self.balances
    }
}

impl Default for WalletEngine {
    fn default() -> Self {
        Self::new()
    }
}
