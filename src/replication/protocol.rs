use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{EngineError, Result};
use crate::models::TransactionKind;

/// Replica-to-replica RPC request: apply a transaction on the backup, or
/// check that it's alive. Internally tagged so the wire form is one
/// self-describing JSON object (`{"type": "apply_transaction", ...}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RpcRequest {
    ApplyTransaction {
        kind: TransactionKind,
        account_id: String,
        amount: Decimal,
        transaction_id: String,
    },
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RpcResponse {
    ApplyTransaction {
        success: bool,
        new_balance: Option<Decimal>,
        message: Option<String>,
        transaction_id: String,
    },
    Ping {
        ok: bool,
    },
}

/// Write one length-prefixed frame: a 4-byte little-endian length, then that
/// many bytes of JSON. Simpler than a MySQL-style sequenced packet since
/// only one request is ever in flight per connection.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(value)?;
    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame. Returns `Ok(None)` on a clean EOF before
/// any bytes of the next frame arrive (peer closed the connection).
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncReadExt + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(EngineError::Io(err)),
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    let value = serde_json::from_slice(&payload)?;
    Ok(Some(value))
}
