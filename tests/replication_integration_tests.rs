//! End-to-end coverage of the primary/backup replication scenarios,
//! exercised over a real TCP loopback connection between two independently
//! recovered engines, one driving the other only through the replication
//! RPC.

use std::time::Duration;

use rust_decimal_macros::dec;
use tempfile::TempDir;

use wallet_replica::concurrent_engine::EngineHandle;
use wallet_replica::failover::{FailoverManager, Mode};
use wallet_replica::orchestrator::PrimaryOrchestrator;
use wallet_replica::persistence::{FileLedgerStore, LedgerStore};
use wallet_replica::persistent_engine::PersistentEngine;
use wallet_replica::replication::{ReplicationClient, ReplicationServer};

struct TwoReplicaHarness {
    orchestrator: PrimaryOrchestrator<FileLedgerStore>,
    backup_dir: TempDir,
    _primary_dir: TempDir,
}

async fn start_backup(dir: &std::path::Path) -> String {
    let store = FileLedgerStore::open(dir, "backup").unwrap();
    let engine = EngineHandle::new(PersistentEngine::recover(store).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = ReplicationServer::new(engine);
    tokio::spawn(async move { server.serve(listener).await });
    addr
}

async fn harness() -> TwoReplicaHarness {
    let backup_dir = tempfile::tempdir().unwrap();
    let backup_addr = start_backup(backup_dir.path()).await;

    let primary_dir = tempfile::tempdir().unwrap();
    let primary_store = FileLedgerStore::open(primary_dir.path(), "primary").unwrap();
    let primary_engine = EngineHandle::new(PersistentEngine::recover(primary_store).unwrap());

    let client = ReplicationClient::new(backup_addr, Duration::from_secs(2), Duration::from_secs(2));
    let orchestrator = PrimaryOrchestrator::new(primary_engine, client, FailoverManager::new());

    TwoReplicaHarness {
        orchestrator,
        backup_dir,
        _primary_dir: primary_dir,
    }
}

fn backup_ledger_ids(dir: &std::path::Path) -> Vec<String> {
    let store = FileLedgerStore::open(dir, "backup").unwrap();
    store.load_all().unwrap().into_iter().map(|r| r.transaction_id).collect()
}

#[tokio::test]
async fn scenario_1_happy_path_deposit() {
    let h = harness().await;

    let record = h.orchestrator.deposit("user123", dec!(100.00), "t1").await.unwrap();
    assert!(record.success.unwrap());
    assert_eq!(record.new_balance, Some(dec!(100.00)));

    assert_eq!(h.orchestrator.get_balance("user123").await, dec!(100.00));
    assert!(backup_ledger_ids(h.backup_dir.path()).contains(&"t1".to_string()));
}

#[tokio::test]
async fn scenario_2_idempotent_retry_creates_no_new_entry() {
    let h = harness().await;

    let first = h.orchestrator.deposit("user123", dec!(100.00), "t1").await.unwrap();
    let second = h.orchestrator.deposit("user123", dec!(100.00), "t1").await.unwrap();

    assert_eq!(first.new_balance, second.new_balance);
    assert_eq!(h.orchestrator.get_balance("user123").await, dec!(100.00));

    let backup_ids = backup_ledger_ids(h.backup_dir.path());
    assert_eq!(backup_ids.iter().filter(|id| *id == "t1").count(), 1);
}

#[tokio::test]
async fn scenario_3_insufficient_funds_then_idempotent_retry() {
    let h = harness().await;
    h.orchestrator.deposit("user123", dec!(100.00), "t1").await.unwrap();

    let first = h.orchestrator.withdraw("user123", dec!(500.00), "t2").await.unwrap();
    assert_eq!(first.success, Some(false));
    assert_eq!(first.message.as_deref(), Some("insufficient balance"));
    assert_eq!(h.orchestrator.get_balance("user123").await, dec!(100.00));

    let retry = h.orchestrator.withdraw("user123", dec!(500.00), "t2").await.unwrap();
    assert_eq!(retry.success, Some(false));
    assert_eq!(h.orchestrator.get_balance("user123").await, dec!(100.00));
}

#[tokio::test]
async fn scenario_4_crash_during_deposit_rolls_back_and_allows_retry_with_new_id() {
    let dir = tempfile::tempdir().unwrap();

    // Simulate the crash: a PENDING record lands on disk, the process dies
    // before the COMMITTED write and before the balance mutation is ever
    // observed by a fresh engine.
    {
        let mut store = FileLedgerStore::open(dir.path(), "primary").unwrap();
        let pending = wallet_replica::models::TransactionRecord::pending(
            "t3",
            "user456",
            dec!(50.00),
            wallet_replica::models::TransactionKind::Deposit,
        );
        store.append(&pending).unwrap();
    }

    let store = FileLedgerStore::open(dir.path(), "primary").unwrap();
    let recovered = PersistentEngine::recover(store).unwrap();
    let record = recovered.lookup("t3").unwrap();
    assert_eq!(record.status, wallet_replica::models::TransactionStatus::RolledBack);
    assert_eq!(recovered.get_balance("user456"), dec!(0));

    let mut recovered = recovered;
    let retried = recovered.deposit("user456", dec!(50.00), "t4").unwrap();
    assert_eq!(retried.new_balance, Some(dec!(50.00)));
}

#[tokio::test]
async fn scenario_5_backup_outage_triggers_failover_and_divergence_is_not_healed() {
    let primary_dir = tempfile::tempdir().unwrap();
    let primary_store = FileLedgerStore::open(primary_dir.path(), "primary").unwrap();
    let primary_engine = EngineHandle::new(PersistentEngine::recover(primary_store).unwrap());

    // Nothing is listening on this address: the backup is "down".
    let dead_client = ReplicationClient::new(
        "127.0.0.1:1".to_string(),
        Duration::from_millis(100),
        Duration::from_millis(100),
    );
    let orchestrator = PrimaryOrchestrator::new(primary_engine, dead_client, FailoverManager::new());

    let record = orchestrator.deposit("u", dec!(10), "t5").await.unwrap();
    assert_eq!(record.new_balance, Some(dec!(10)));
    assert_eq!(orchestrator.failover().mode(), Mode::Failover);
}

#[tokio::test]
async fn scenario_6_order_preservation_under_concurrent_deposits() {
    let h = std::sync::Arc::new(harness().await);

    let mut handles = Vec::new();
    for i in 0..100 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.orchestrator
                .deposit("shared", dec!(1.0), &format!("c{i}"))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.orchestrator.get_balance("shared").await, dec!(100.0));

    let backup_ids = backup_ledger_ids(h.backup_dir.path());
    let unique: std::collections::HashSet<_> = backup_ids.into_iter().filter(|id| id.starts_with('c')).collect();
    assert_eq!(unique.len(), 100);
}
