use rust_decimal::Decimal;
use serde::Serialize;

/// Snapshot of a single account's balance, always non-negative.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub account_id: String,
    pub balance: Decimal,
}

impl Account {
    pub fn new(account_id: impl Into<String>, balance: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            balance,
        }
    }
}
