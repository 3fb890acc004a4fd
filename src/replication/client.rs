use std::time::Duration;

use rust_decimal::Decimal;
use tokio::net::TcpStream;

use crate::models::TransactionKind;
use crate::replication::protocol::{read_frame, write_frame, RpcRequest, RpcResponse};

/// Outcome of a replication round-trip, as the backup's engine sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicatedResult {
    pub success: bool,
    pub new_balance: Option<Decimal>,
    pub message: Option<String>,
}

/// A failed replication attempt. Only `Unreachable` feeds the failover
/// manager — a decoded reply, even `success: false`, is a successful
/// round-trip and is returned as `Ok` from [`ReplicationClient`].
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("backup unreachable: {0}")]
    Unreachable(String),
}

/// Primary-side RPC stub to the backup's [`crate::replication::server::ReplicationServer`].
/// Opens a fresh connection per call — simplest thing that's correct at the
/// transaction volumes this service targets.
#[derive(Clone)]
pub struct ReplicationClient {
    addr: String,
    replicate_timeout: Duration,
    ping_timeout: Duration,
}

impl ReplicationClient {
    pub fn new(addr: String, replicate_timeout: Duration, ping_timeout: Duration) -> Self {
        Self {
            addr,
            replicate_timeout,
            ping_timeout,
        }
    }

    pub async fn replicate(
        &self,
        kind: TransactionKind,
        account_id: &str,
        amount: Decimal,
        transaction_id: &str,
    ) -> Result<ReplicatedResult, ReplicationError> {
        let request = RpcRequest::ApplyTransaction {
            kind,
            account_id: account_id.to_string(),
            amount,
            transaction_id: transaction_id.to_string(),
        };

        let response = tokio::time::timeout(self.replicate_timeout, self.round_trip(request))
            .await
            .map_err(|_| ReplicationError::Unreachable("replicate timed out".to_string()))?
            .map_err(|err| ReplicationError::Unreachable(err.to_string()))?;

        match response {
            Some(RpcResponse::ApplyTransaction {
                success,
                new_balance,
                message,
                ..
            }) => Ok(ReplicatedResult {
                success,
                new_balance,
                message,
            }),
            Some(_) => Err(ReplicationError::Unreachable("unexpected reply shape".to_string())),
            None => Err(ReplicationError::Unreachable("connection closed before reply".to_string())),
        }
    }

    pub async fn ping(&self) -> bool {
        let outcome = tokio::time::timeout(self.ping_timeout, self.round_trip(RpcRequest::Ping)).await;
        matches!(outcome, Ok(Ok(Some(RpcResponse::Ping { ok: true }))))
    }

    async fn round_trip(&self, request: RpcRequest) -> crate::error::Result<Option<RpcResponse>> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        write_frame(&mut stream, &request).await?;
        read_frame(&mut stream).await
    }
}
