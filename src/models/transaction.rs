use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The two mutating operations the wallet engine understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

/// Lifecycle state of a [`TransactionRecord`]. Monotonic: `Pending` ->
/// `Committed` or `Pending` -> `RolledBack`, never backwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Committed,
    RolledBack,
}

/// A single entry in the ledger, keyed by the client-supplied `transaction_id`.
///
/// Every status transition of a given `transaction_id` is appended as a new
/// line in the WAL; the last line for an id is authoritative on reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub success: Option<bool>,
    pub new_balance: Option<Decimal>,
    pub message: Option<String>,
    pub created_at: u128,
}

impl TransactionRecord {
    pub fn pending(
        transaction_id: impl Into<String>,
        account_id: impl Into<String>,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            account_id: account_id.into(),
            amount,
            kind,
            status: TransactionStatus::Pending,
            success: None,
            new_balance: None,
            message: None,
            created_at: now_millis(),
        }
    }

    /// Produce the COMMITTED record for a successful application of `self`.
    pub fn commit_success(&self, new_balance: Decimal) -> Self {
        Self {
            status: TransactionStatus::Committed,
            success: Some(true),
            new_balance: Some(new_balance),
            message: None,
            created_at: now_millis(),
            ..self.clone()
        }
    }

    /// Produce the COMMITTED record for a business-rejected application of `self`.
    pub fn commit_failure(&self, message: impl Into<String>) -> Self {
        Self {
            status: TransactionStatus::Committed,
            success: Some(false),
            new_balance: None,
            message: Some(message.into()),
            created_at: now_millis(),
            ..self.clone()
        }
    }

    /// Produce the ROLLED_BACK record recovery writes for an in-flight PENDING entry.
    pub fn rolled_back(&self) -> Self {
        Self {
            status: TransactionStatus::RolledBack,
            success: Some(false),
            new_balance: None,
            message: Some("rolled back during crash recovery".to_string()),
            created_at: now_millis(),
            ..self.clone()
        }
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis()
}
