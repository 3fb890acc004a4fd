use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::concurrent_engine::EngineHandle;
use crate::error::Result;
use crate::failover::{FailoverManager, Mode};
use crate::models::{TransactionKind, TransactionRecord};
use crate::persistence::LedgerStore;
use crate::replication::ReplicationClient;

/// Sequences the backup-first replication protocol: replicate to the
/// backup, then apply locally, comparing results for divergence.
pub struct PrimaryOrchestrator<L: LedgerStore> {
    engine: EngineHandle<L>,
    replication: ReplicationClient,
    failover: FailoverManager,
    divergence_alarm: Arc<AtomicBool>,
    // One lock per account_id ever seen, so that two mutations racing on
    // the same account can't have their replicate-then-apply sequences
    // interleave; mutations on different accounts never contend. Entries
    // are never evicted, trading a little long-lived memory for a lock map
    // that never needs to coordinate removal with an in-flight acquire.
    account_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<L: LedgerStore> PrimaryOrchestrator<L> {
    pub fn new(engine: EngineHandle<L>, replication: ReplicationClient, failover: FailoverManager) -> Self {
        Self {
            engine,
            replication,
            failover,
            divergence_alarm: Arc::new(AtomicBool::new(false)),
            account_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn account_lock(&self, account_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock().await;
        locks.entry(account_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    pub fn failover(&self) -> &FailoverManager {
        &self.failover
    }

    /// Set once and never cleared: replication divergence during NORMAL
    /// mode is a correctness violation, not a recoverable runtime condition.
    pub fn divergence_detected(&self) -> bool {
        self.divergence_alarm.load(Ordering::Acquire)
    }

    pub async fn deposit(&self, account_id: &str, amount: Decimal, transaction_id: &str) -> Result<TransactionRecord> {
        self.mutate(TransactionKind::Deposit, account_id, amount, transaction_id).await
    }

    pub async fn withdraw(&self, account_id: &str, amount: Decimal, transaction_id: &str) -> Result<TransactionRecord> {
        self.mutate(TransactionKind::Withdraw, account_id, amount, transaction_id).await
    }

    pub async fn get_balance(&self, account_id: &str) -> Decimal {
        self.engine.get_balance(account_id).await
    }

    /// Cheap read-only check for a cached outcome, used by the HTTP edge to
    /// short-circuit a replay before edge validation runs.
    pub async fn lookup(&self, transaction_id: &str) -> Option<TransactionRecord> {
        self.engine.lookup(transaction_id).await
    }

    /// Backup-first sequencing. The engine write lock is acquired only for
    /// the local apply, never held across the replication RPC. A durability
    /// failure on the local apply is returned as `Err`; the HTTP edge maps
    /// that to a 500.
    ///
    /// The per-account lock is held across both the replication RPC and the
    /// local apply, so a second mutation on the same account can't start
    /// its own replicate call until this one has begun applying locally —
    /// otherwise the backup's accept loop and the primary's write lock
    /// could each pick a different winner between two concurrent requests.
    async fn mutate(
        &self,
        kind: TransactionKind,
        account_id: &str,
        amount: Decimal,
        transaction_id: &str,
    ) -> Result<TransactionRecord> {
        let lock = self.account_lock(account_id).await;
        let _account_guard = lock.lock().await;

        let backup_result = if self.failover.mode() == Mode::Normal {
            match self.replication.replicate(kind, account_id, amount, transaction_id).await {
                Ok(result) => Some(result),
                Err(err) => {
                    tracing::warn!(transaction_id, error = %err, "replication unreachable");
                    self.failover.demote();
                    None
                }
            }
        } else {
            None
        };

        let local_record = match kind {
            TransactionKind::Deposit => self.engine.deposit(account_id, amount, transaction_id).await,
            TransactionKind::Withdraw => self.engine.withdraw(account_id, amount, transaction_id).await,
        }?;

        if let Some(backup) = backup_result {
            let success_matches = backup.success == local_record.success.unwrap_or(false);
            let balance_matches = !backup.success || backup.new_balance == local_record.new_balance;
            if !success_matches || !balance_matches {
                self.divergence_alarm.store(true, Ordering::Release);
                tracing::error!(
                    transaction_id,
                    ?backup,
                    local_success = ?local_record.success,
                    local_new_balance = ?local_record.new_balance,
                    "replication divergence: primary and backup disagree during NORMAL mode"
                );
            }
        }

        Ok(local_record)
    }
}
