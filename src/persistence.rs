use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;

use crate::error::{EngineError, Result};
use crate::models::TransactionRecord;

/// Durable storage for the ledger (write-ahead log) and balance snapshot.
///
/// This is the crash-recovery boundary: every `append` must be on disk
/// (fsync'd) before it returns, and `load_all` must reconstruct the full
/// append-ordered log so recovery can replay it.
pub trait LedgerStore: Send + Sync {
    /// Durably append one status transition for a transaction_id. The
    /// ledger is append-only: multiple lines may exist for the same id
    /// over its lifetime (PENDING, then COMMITTED or ROLLED_BACK); the
    /// last line for an id is authoritative.
    fn append(&mut self, record: &TransactionRecord) -> Result<()>;

    /// Read every record ever appended, in the order they were written.
    fn load_all(&self) -> Result<Vec<TransactionRecord>>;

    /// Best-effort snapshot of current balances, for operator inspection.
    /// Never consulted during recovery — the ledger is always the source
    /// of truth — so a failure here is logged by the caller, not propagated
    /// as a failed transaction.
    fn write_snapshot(&self, balances: &HashMap<String, Decimal>) -> Result<()>;
}

/// Append-only, newline-delimited-JSON ledger file plus an atomically
/// rewritten JSON balance snapshot.
pub struct FileLedgerStore {
    ledger_path: PathBuf,
    snapshot_path: PathBuf,
    ledger_file: File,
}

impl FileLedgerStore {
    /// Open (creating if necessary) the ledger and snapshot files for a
    /// given replica role (`"primary"` or `"backup"`) under `state_dir`.
    pub fn open(state_dir: &Path, role: &str) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        let ledger_path = state_dir.join(format!("{role}_ledger.jsonl"));
        let snapshot_path = state_dir.join(format!("{role}_snapshot.json"));

        let ledger_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&ledger_path)?;

        Ok(Self {
            ledger_path,
            snapshot_path,
            ledger_file,
        })
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }
}

impl LedgerStore for FileLedgerStore {
    fn append(&mut self, record: &TransactionRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.ledger_file.write_all(line.as_bytes())?;
        self.ledger_file.flush()?;
        self.ledger_file.sync_data()?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<TransactionRecord>> {
        load_ledger_file(&self.ledger_path)
    }

    fn write_snapshot(&self, balances: &HashMap<String, Decimal>) -> Result<()> {
        let tmp_path = self.snapshot_path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(balances)?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.snapshot_path)?;
        Ok(())
    }
}

/// Read every well-formed line of a ledger file. A final line that fails to
/// parse is treated as a torn write from a crash mid-append and dropped
/// with a warning rather than failing recovery; a malformed line anywhere
/// else in the file is real corruption and refuses to start.
fn load_ledger_file(path: &Path) -> Result<Vec<TransactionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<_>>()?;

    let mut records = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TransactionRecord>(line) {
            Ok(record) => records.push(record),
            Err(err) => {
                if idx == lines.len() - 1 {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "dropping truncated final ledger line (likely a torn crash write)"
                    );
                } else {
                    return Err(EngineError::Corrupt {
                        path: path.display().to_string(),
                        reason: format!("unreadable record at line {}: {err}", idx + 1),
                    });
                }
            }
        }
    }

    Ok(records)
}
