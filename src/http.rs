use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orchestrator::PrimaryOrchestrator;
use crate::persistence::LedgerStore;

/// Thin request/response adaptor over [`PrimaryOrchestrator`]. JSON
/// (de)serialization and status-code mapping live here and nowhere else —
/// this is the validation boundary: JSON crossing the HTTP edge is
/// validated into a fixed record shape before it ever reaches the engine.
pub fn router<L>(orchestrator: Arc<PrimaryOrchestrator<L>>) -> Router
where
    L: LedgerStore + 'static,
{
    Router::new()
        .route("/deposit", post(deposit::<L>))
        .route("/withdraw", post(withdraw::<L>))
        .route("/balance", post(balance::<L>))
        .route("/health", get(health))
        .with_state(orchestrator)
}

#[derive(Debug, Deserialize)]
struct MutationRequest {
    account_id: String,
    amount: Decimal,
    transaction_id: String,
}

#[derive(Debug, Serialize)]
struct MutationResponse {
    success: bool,
    message: Option<String>,
    new_balance: Option<Decimal>,
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
struct BalanceRequest {
    account_id: String,
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    success: bool,
    balance: Decimal,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn validate(req: &MutationRequest) -> Result<(), &'static str> {
    if req.amount <= Decimal::ZERO {
        return Err("amount must be greater than zero");
    }
    if req.account_id.trim().is_empty() {
        return Err("account_id must not be empty");
    }
    if req.transaction_id.trim().is_empty() {
        return Err("transaction_id must not be empty");
    }
    Ok(())
}

async fn deposit<L: LedgerStore>(
    State(orchestrator): State<Arc<PrimaryOrchestrator<L>>>,
    Json(req): Json<MutationRequest>,
) -> impl IntoResponse {
    mutate(orchestrator, req, true).await
}

async fn withdraw<L: LedgerStore>(
    State(orchestrator): State<Arc<PrimaryOrchestrator<L>>>,
    Json(req): Json<MutationRequest>,
) -> impl IntoResponse {
    mutate(orchestrator, req, false).await
}

async fn mutate<L: LedgerStore>(
    orchestrator: Arc<PrimaryOrchestrator<L>>,
    req: MutationRequest,
    is_deposit: bool,
) -> (StatusCode, Json<MutationResponse>) {
    // A replay of a known transaction_id returns its cached outcome
    // verbatim, even if the retry's payload would otherwise fail edge
    // validation below — the request never touches the WAL or balance
    // either way.
    if let Some(cached) = orchestrator.lookup(&req.transaction_id).await {
        let status = if cached.success.unwrap_or(false) {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        };
        return (
            status,
            Json(MutationResponse {
                success: cached.success.unwrap_or(false),
                message: cached.message,
                new_balance: cached.new_balance,
                transaction_id: cached.transaction_id,
            }),
        );
    }

    if let Err(reason) = validate(&req) {
        return (
            StatusCode::BAD_REQUEST,
            Json(MutationResponse {
                success: false,
                message: Some(reason.to_string()),
                new_balance: None,
                transaction_id: req.transaction_id,
            }),
        );
    }

    let result = if is_deposit {
        orchestrator.deposit(&req.account_id, req.amount, &req.transaction_id).await
    } else {
        orchestrator.withdraw(&req.account_id, req.amount, &req.transaction_id).await
    };

    match result {
        Ok(record) => {
            // Idempotent replay returns the same status code as the original
            // response, so a business failure stays 400 even on replay
            // rather than becoming a 200.
            let status = if record.success.unwrap_or(false) {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            (
                status,
                Json(MutationResponse {
                    success: record.success.unwrap_or(false),
                    message: record.message,
                    new_balance: record.new_balance,
                    transaction_id: record.transaction_id,
                }),
            )
        }
        Err(err) => {
            tracing::error!(error = %err, "durability failure handling mutation");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MutationResponse {
                    success: false,
                    message: Some("internal error".to_string()),
                    new_balance: None,
                    transaction_id: req.transaction_id,
                }),
            )
        }
    }
}

async fn balance<L: LedgerStore>(
    State(orchestrator): State<Arc<PrimaryOrchestrator<L>>>,
    Json(req): Json<BalanceRequest>,
) -> impl IntoResponse {
    if req.account_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BalanceResponse {
                success: false,
                balance: Decimal::ZERO,
                message: Some("account_id must not be empty".to_string()),
            }),
        );
    }

    let balance = orchestrator.get_balance(&req.account_id).await;
    (
        StatusCode::OK,
        Json(BalanceResponse {
            success: true,
            balance,
            message: None,
        }),
    )
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrent_engine::EngineHandle;
    use crate::failover::FailoverManager;
    use crate::persistence::FileLedgerStore;
    use crate::persistent_engine::PersistentEngine;
    use crate::replication::ReplicationClient;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::open(dir.path(), "primary").unwrap();
        let engine = EngineHandle::new(PersistentEngine::recover(store).unwrap());
        // Nothing listens on this port; every mutation demotes to FAILOVER
        // and proceeds locally, which is exactly what these HTTP-layer
        // tests want to exercise.
        let client = ReplicationClient::new(
            "127.0.0.1:1".to_string(),
            Duration::from_millis(50),
            Duration::from_millis(50),
        );
        let orchestrator = Arc::new(PrimaryOrchestrator::new(engine, client, FailoverManager::new()));
        std::mem::forget(dir);
        router(orchestrator)
    }

    async fn post_json(router: &Router, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let router = test_router();
        let response = router
            .oneshot(axum::http::Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn deposit_then_balance_reflects_it() {
        let router = test_router();
        let (status, body) = post_json(
            &router,
            "/deposit",
            serde_json::json!({"account_id": "alice", "amount": "100.0", "transaction_id": "t1"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["new_balance"], "100.0");

        let (status, body) = post_json(&router, "/balance", serde_json::json!({"account_id": "alice"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], "100.0");
    }

    #[tokio::test]
    async fn negative_amount_is_rejected_at_the_edge() {
        let router = test_router();
        let (status, body) = post_json(
            &router,
            "/deposit",
            serde_json::json!({"account_id": "alice", "amount": "-5", "transaction_id": "t1"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn insufficient_funds_returns_400() {
        let router = test_router();
        post_json(
            &router,
            "/deposit",
            serde_json::json!({"account_id": "alice", "amount": "10", "transaction_id": "t1"}),
        )
        .await;

        let (status, body) = post_json(
            &router,
            "/withdraw",
            serde_json::json!({"account_id": "alice", "amount": "500", "transaction_id": "t2"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "insufficient balance");
    }

    #[tokio::test]
    async fn idempotent_replay_returns_same_status_and_body() {
        let router = test_router();
        let (status1, body1) = post_json(
            &router,
            "/deposit",
            serde_json::json!({"account_id": "alice", "amount": "10", "transaction_id": "t1"}),
        )
        .await;
        let (status2, body2) = post_json(
            &router,
            "/deposit",
            serde_json::json!({"account_id": "alice", "amount": "999", "transaction_id": "t1"}),
        )
        .await;
        assert_eq!(status1, status2);
        assert_eq!(body1, body2);
    }

    #[tokio::test]
    async fn idempotent_replay_short_circuits_even_with_an_otherwise_invalid_payload() {
        let router = test_router();
        let (status1, body1) = post_json(
            &router,
            "/deposit",
            serde_json::json!({"account_id": "alice", "amount": "10", "transaction_id": "t1"}),
        )
        .await;
        assert_eq!(status1, StatusCode::OK);

        // Same transaction_id, replayed with a negative amount that would
        // fail edge validation on a fresh request.
        let (status2, body2) = post_json(
            &router,
            "/deposit",
            serde_json::json!({"account_id": "alice", "amount": "-5", "transaction_id": "t1"}),
        )
        .await;
        assert_eq!(status2, StatusCode::OK);
        assert_eq!(body1, body2);
    }
}
