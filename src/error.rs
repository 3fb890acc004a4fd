use thiserror::Error;

/// Errors that can occur while persisting or recovering engine state.
/// These are system-level failures (I/O, corruption), never business
/// outcomes like insufficient balance — those are represented as
/// `Ok(TransactionRecord { success: false, .. })`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ledger corruption at {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
