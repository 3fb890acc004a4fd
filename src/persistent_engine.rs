use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::engine::WalletEngine;
use crate::error::Result;
use crate::models::{TransactionKind, TransactionRecord, TransactionStatus};
use crate::persistence::LedgerStore;

/// Wraps [`WalletEngine`] with write-ahead-log durability and crash
/// recovery.
///
/// ## WAL pattern
///
/// Every mutation writes a PENDING record (fsync'd) before touching the
/// balance map, then a COMMITTED record (fsync'd) once the outcome is
/// known. A crash between those two writes leaves the ledger's last entry
/// for that id as PENDING; [`PersistentEngine::recover`] resolves it to
/// ROLLED_BACK on the next startup rather than guessing whether the
/// balance mutation landed.
pub struct PersistentEngine<L: LedgerStore> {
    engine: WalletEngine,
    store: L,
}

impl<L: LedgerStore> PersistentEngine<L> {
    /// Rebuild engine state from the ledger, rolling back anything left
    /// PENDING from an unclean shutdown. Safe to call against a brand-new,
    /// empty store too, so startup always goes through one code path.
    ///
    /// Recovery algorithm:
    /// 1. Replay the log, keeping the last record written per transaction_id.
    /// 2. Rebuild balances by summing committed, successful deposits and
    ///    withdrawals per account, reconstructing the balance the live
    ///    engine would have reached without replaying operations one at a
    ///    time.
    /// 3. Any transaction_id whose last record is still PENDING never
    ///    reached a commit decision; it is rolled back and the rollback is
    ///    itself made durable before the engine is considered recovered.
    pub fn recover(mut store: L) -> Result<Self> {
        let log = store.load_all()?;

        let mut latest: HashMap<String, TransactionRecord> = HashMap::new();
        for record in log {
            latest.insert(record.transaction_id.clone(), record);
        }

        let mut engine = WalletEngine::new();
        let mut balances: HashMap<String, Decimal> = HashMap::new();

        for record in latest.values() {
            if record.status == TransactionStatus::Committed && record.success == Some(true) {
                let entry = balances.entry(record.account_id.clone()).or_insert(Decimal::ZERO);
                match record.kind {
                    TransactionKind::Deposit => *entry += record.amount,
                    TransactionKind::Withdraw => *entry -= record.amount,
                }
            }
        }
        for (account_id, balance) in &balances {
            engine.set_balance(account_id, *balance);
        }

        let pending_ids: Vec<String> = latest
            .values()
            .filter(|r| r.status == TransactionStatus::Pending)
            .map(|r| r.transaction_id.clone())
            .collect();

        for id in pending_ids {
            let pending = latest.remove(&id).expect("id came from latest");
            let rolled_back = pending.rolled_back();
            store.append(&rolled_back)?;
            tracing::warn!(
                transaction_id = %rolled_back.transaction_id,
                "rolled back in-flight transaction found PENDING at startup"
            );
            latest.insert(id, rolled_back);
        }

        for record in latest.into_values() {
            engine.remember(record);
        }

        let _ = store.write_snapshot(engine.balances());

        Ok(Self { engine, store })
    }

    /// Apply a deposit, durably and idempotently.
    pub fn deposit(
        &mut self,
        account_id: &str,
        amount: Decimal,
        transaction_id: &str,
    ) -> Result<TransactionRecord> {
        if let Some(cached) = self.engine.lookup(transaction_id) {
            tracing::debug!(transaction_id, "idempotent replay of deposit");
            return Ok(cached);
        }

        let pending = TransactionRecord::pending(transaction_id, account_id, amount, TransactionKind::Deposit);
        self.store.append(&pending)?;
        self.engine.remember(pending.clone());

        let new_balance = self.engine.credit(account_id, amount);
        let committed = pending.commit_success(new_balance);
        if let Err(err) = self.store.append(&committed) {
            // The COMMITTED record never reached disk, so the ledger's last
            // word on this id is still PENDING. Undo the credit so the live
            // balance doesn't run ahead of what the WAL can prove happened.
            self.engine.credit(account_id, -amount);
            return Err(err);
        }
        self.engine.remember(committed.clone());

        self.flush_snapshot();
        Ok(committed)
    }

    /// Apply a withdrawal, durably and idempotently.
    pub fn withdraw(
        &mut self,
        account_id: &str,
        amount: Decimal,
        transaction_id: &str,
    ) -> Result<TransactionRecord> {
        if let Some(cached) = self.engine.lookup(transaction_id) {
            tracing::debug!(transaction_id, "idempotent replay of withdrawal");
            return Ok(cached);
        }

        let pending = TransactionRecord::pending(transaction_id, account_id, amount, TransactionKind::Withdraw);
        self.store.append(&pending)?;
        self.engine.remember(pending.clone());

        let debited = self.engine.debit_if_sufficient(account_id, amount);
        let committed = match debited {
            Some(new_balance) => pending.commit_success(new_balance),
            None => {
                tracing::debug!(transaction_id, account_id, "withdrawal rejected: insufficient balance");
                pending.commit_failure("insufficient balance")
            }
        };
        if let Err(err) = self.store.append(&committed) {
            // Same compensating-undo reasoning as deposit: only revert if a
            // debit actually landed in memory.
            if debited.is_some() {
                self.engine.credit(account_id, amount);
            }
            return Err(err);
        }
        self.engine.remember(committed.clone());

        self.flush_snapshot();
        Ok(committed)
    }

    pub fn get_balance(&self, account_id: &str) -> Decimal {
        self.engine.get_balance(account_id)
    }

    pub fn lookup(&self, transaction_id: &str) -> Option<TransactionRecord> {
        self.engine.lookup(transaction_id)
    }

    pub fn engine(&self) -> &WalletEngine {
        &self.engine
    }

    fn flush_snapshot(&self) {
        if let Err(err) = self.store.write_snapshot(self.engine.balances()) {
            tracing::error!(error = %err, "failed to write balance snapshot (ledger remains authoritative)");
        }
    }
}
