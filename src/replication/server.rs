use tokio::net::TcpListener;

use crate::concurrent_engine::EngineHandle;
use crate::persistence::LedgerStore;
use crate::replication::protocol::{read_frame, write_frame, RpcRequest, RpcResponse};

/// Backup-side RPC endpoint. Drives the backup's engine exclusively — the
/// backup never receives HTTP traffic.
pub struct ReplicationServer<L: LedgerStore> {
    engine: EngineHandle<L>,
}

impl<L: LedgerStore + 'static> ReplicationServer<L> {
    pub fn new(engine: EngineHandle<L>) -> Self {
        Self { engine }
    }

    /// Accept loop: each connection is handled on its own task until the
    /// peer closes it or a frame fails to decode.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let engine = self.engine.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, engine).await {
                    tracing::warn!(%peer, error = %err, "replication connection ended with an error");
                }
            });
        }
    }
}

async fn handle_connection<L: LedgerStore>(
    mut stream: tokio::net::TcpStream,
    engine: EngineHandle<L>,
) -> crate::error::Result<()> {
    loop {
        let request: RpcRequest = match read_frame(&mut stream).await? {
            Some(request) => request,
            None => return Ok(()),
        };

        let response = match request {
            RpcRequest::Ping => RpcResponse::Ping { ok: true },
            RpcRequest::ApplyTransaction {
                kind,
                account_id,
                amount,
                transaction_id,
            } => {
                let record = match kind {
                    crate::models::TransactionKind::Deposit => {
                        engine.deposit(&account_id, amount, &transaction_id).await?
                    }
                    crate::models::TransactionKind::Withdraw => {
                        engine.withdraw(&account_id, amount, &transaction_id).await?
                    }
                };
                RpcResponse::ApplyTransaction {
                    success: record.success.unwrap_or(false),
                    new_balance: record.new_balance,
                    message: record.message,
                    transaction_id: record.transaction_id,
                }
            }
        };

        write_frame(&mut stream, &response).await?;
    }
}
