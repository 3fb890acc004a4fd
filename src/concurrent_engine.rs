use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Account, TransactionRecord};
use crate::persistence::LedgerStore;
use crate::persistent_engine::PersistentEngine;

/// Shareable, lock-guarded handle onto a single [`PersistentEngine`].
///
/// Sharding clients across independent engines would cut lock contention,
/// but the replication protocol needs a single, totally ordered WAL per
/// replica — sharding the engine would mean sharding replication too,
/// turning one RPC stream into N and losing the simple one-lock
/// "apply, then replicate" suspension point the protocol depends on. A
/// single shared engine behind a cheaply cloneable `Arc<RwLock<_>>` is the
/// right shape here; every connection task gets its own handle.
pub struct EngineHandle<L: LedgerStore> {
    inner: Arc<RwLock<PersistentEngine<L>>>,
}

// Written by hand rather than `#[derive(Clone)]`: the derive macro would
// require `L: Clone`, but cloning a handle only ever clones the `Arc`.
impl<L: LedgerStore> Clone for EngineHandle<L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<L: LedgerStore> EngineHandle<L> {
    pub fn new(engine: PersistentEngine<L>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub async fn deposit(&self, account_id: &str, amount: Decimal, transaction_id: &str) -> Result<TransactionRecord> {
        self.inner.write().await.deposit(account_id, amount, transaction_id)
    }

    pub async fn withdraw(&self, account_id: &str, amount: Decimal, transaction_id: &str) -> Result<TransactionRecord> {
        self.inner.write().await.withdraw(account_id, amount, transaction_id)
    }

    pub async fn get_balance(&self, account_id: &str) -> Decimal {
        self.inner.read().await.get_balance(account_id)
    }

    pub async fn lookup(&self, transaction_id: &str) -> Option<TransactionRecord> {
        self.inner.read().await.lookup(transaction_id)
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.inner.read().await.engine().accounts()
    }
}
