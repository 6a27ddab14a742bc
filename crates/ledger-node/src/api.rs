use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{AccountId, Block, CancelToken, ChainFault, Ledger, LedgerError, Transaction};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Ledger>,
    /// Tokens of the mining cycles currently running or queued on the gate.
    in_flight: Arc<Mutex<Vec<CancelToken>>>,
}

impl AppState {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(ledger),
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Keeps a cycle's token registered until the cycle itself ends, even when
/// the request that started it has gone away.
struct InFlight {
    registry: Arc<Mutex<Vec<CancelToken>>>,
    token: CancelToken,
}

impl InFlight {
    fn register(registry: &Arc<Mutex<Vec<CancelToken>>>) -> Self {
        let token = CancelToken::new();
        registry.lock().push(token.clone());
        Self {
            registry: Arc::clone(registry),
            token,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.registry.lock().retain(|t| !t.same_as(&self.token));
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Head {
    height: u64,
    hash: String,
}

#[derive(Serialize)]
struct Validity {
    valid: bool,
    fault: Option<ChainFault>,
}

#[derive(Serialize)]
struct Pending {
    pending: Vec<Transaction>,
}

#[derive(Deserialize)]
struct TxIn {
    from: AccountId,
    to: AccountId,
    amount: u64,
}

#[derive(Serialize)]
struct Accepted {
    accepted: bool,
    tx: Transaction,
}

#[derive(Deserialize)]
struct MineIn {
    miner: AccountId,
}

#[derive(Serialize)]
struct Mined {
    index: u64,
    hash: String,
    transactions: usize,
    attempts: u64,
    nonce: u64,
    elapsed_ms: u64,
}

#[derive(Serialize)]
struct Cancelled {
    cancelled: usize,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::MiningCancelled { .. } => StatusCode::CONFLICT,
            LedgerError::BlockOutOfRange { .. } => StatusCode::NOT_FOUND,
            LedgerError::InvalidAccountId(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/chain", get(chain))
        .route("/chain/head", get(head))
        .route("/chain/validate", get(validate))
        .route("/blocks/{index}", get(block))
        .route("/mempool", get(mempool))
        .route("/tx", post(submit))
        .route("/mine", post(mine))
        .route("/mine/cancel", post(cancel))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn chain(State(state): State<AppState>) -> Result<Response, ApiError> {
    let rendered = state.ledger.render()?;
    Ok(([(header::CONTENT_TYPE, "application/json")], rendered).into_response())
}

async fn head(State(state): State<AppState>) -> Json<Head> {
    let (height, hash) = state.ledger.head();
    Json(Head {
        height,
        hash: hex::encode(hash),
    })
}

async fn validate(State(state): State<AppState>) -> Json<Validity> {
    let fault = state.ledger.verify().err();
    if let Some(fault) = &fault {
        warn!(%fault, "validation requested on a corrupted chain");
    }
    Json(Validity {
        valid: fault.is_none(),
        fault,
    })
}

async fn block(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<Block>, ApiError> {
    state.ledger.block(index).map(Json).ok_or_else(|| {
        LedgerError::BlockOutOfRange {
            position: index,
            len: state.ledger.len(),
        }
        .into()
    })
}

async fn mempool(State(state): State<AppState>) -> Json<Pending> {
    Json(Pending {
        pending: state.ledger.pending(),
    })
}

async fn submit(State(state): State<AppState>, Json(tx): Json<TxIn>) -> Json<Accepted> {
    let tx = Transaction::new(tx.from, tx.to, tx.amount);
    state.ledger.submit(tx);
    Json(Accepted { accepted: true, tx })
}

async fn mine(
    State(state): State<AppState>,
    Json(req): Json<MineIn>,
) -> Result<Json<Mined>, ApiError> {
    let in_flight = InFlight::register(&state.in_flight);
    let ledger = Arc::clone(&state.ledger);
    let outcome = tokio::task::spawn_blocking(move || {
        ledger.mine_cycle_cancellable(req.miner, &in_flight.token)
    })
    .await;

    let mined = outcome.map_err(|e| ApiError::internal(format!("mining task failed: {e}")))??;
    Ok(Json(Mined {
        index: mined.block.header.index,
        hash: mined.block.hash_hex(),
        transactions: mined.block.txs.len(),
        attempts: mined.report.attempts,
        nonce: mined.report.nonce,
        elapsed_ms: mined.report.elapsed.as_millis() as u64,
    }))
}

async fn cancel(State(state): State<AppState>) -> Json<Cancelled> {
    let in_flight = state.in_flight.lock();
    for token in in_flight.iter() {
        token.cancel();
    }
    info!(count = in_flight.len(), "mining cancellation requested");
    Json(Cancelled {
        cancelled: in_flight.len(),
    })
}
