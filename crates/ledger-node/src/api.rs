use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::balance::{balance_of, transactions_for};
use ledger_core::coordinator::CoordinatorConfig;
use ledger_core::gateway::{same_peer, NodeStore};
use ledger_core::validation::TransactionRequest;
use ledger_core::{now_timestamp, Block, Chain, NodeState, Transaction, ValidationError};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::constants::NODE_URL_HEADER;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn NodeStore>,
    miner_address: String,
    peer_urls: Arc<[String]>,
}

impl AppState {
    pub fn new(store: Arc<dyn NodeStore>, config: &CoordinatorConfig) -> Self {
        Self {
            store,
            miner_address: config.miner_address.clone(),
            peer_urls: config.peer_urls.clone().into(),
        }
    }

    fn is_known_peer(&self, url: &str) -> bool {
        self.peer_urls.iter().any(|p| same_peer(p, url))
    }
}

#[derive(Debug)]
pub enum ApiError {
    MalformedBody(String),
    InvalidTransaction(ValidationError),
    InvalidChain(String),
    UnknownSender,
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MalformedBody(reason) => {
                (StatusCode::BAD_REQUEST, format!("Malformed request body: {reason}")).into_response()
            }
            ApiError::InvalidTransaction(err) => (
                StatusCode::BAD_REQUEST,
                format!(
                    "Transaction is invalid ({err}). Please make sure that all the attributes are \
                     provided and that the \"transaction fee\" is at least 0.01"
                ),
            )
                .into_response(),
            ApiError::InvalidChain(reason) => {
                (StatusCode::BAD_REQUEST, format!("Invalid blockchain: {reason}")).into_response()
            }
            ApiError::UnknownSender => (StatusCode::UNAUTHORIZED, "Unknown sender.").into_response(),
            ApiError::Internal(err) => {
                warn!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
pub struct AccountSummary {
    pub account: String,
    pub balance: f64,
    pub transactions: Vec<Transaction>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/transaction", post(create_transaction))
        .route("/blockchain", get(get_blockchain).put(update_blockchain))
        .route("/state", get(get_state))
        .route("/balance/{account}", get(get_balance))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn create_transaction(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    // Clients are not required to send a JSON content type.
    let request: TransactionRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::MalformedBody(e.to_string()))?;
    let tx = request
        .into_transaction(now_timestamp())
        .map_err(ApiError::InvalidTransaction)?;
    let id = tx.id();

    state
        .store
        .update_state(&state.miner_address, &mut |s| s.pending_transactions.push(tx.clone()))?;
    info!(%id, from = %tx.from, to = %tx.to, amount = tx.amount, "transaction queued");

    Ok((StatusCode::CREATED, format!("Transaction ID: {id}")).into_response())
}

async fn get_blockchain(State(state): State<AppState>) -> Result<Json<Chain>, ApiError> {
    let mut chain = state.store.load_chain(&state.miner_address)?;
    if chain.is_empty() {
        chain = Chain::with_genesis();
        state.store.save_chain(&state.miner_address, &chain)?;
        info!("initialised chain with genesis block");
    }
    Ok(Json(chain))
}

async fn update_blockchain(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    // Provenance is only the self-reported URL of the caller.
    let sender = headers
        .get(NODE_URL_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::UnknownSender)?;
    if !state.is_known_peer(sender) {
        warn!(sender, "rejected chain from unknown sender");
        return Err(ApiError::UnknownSender);
    }

    let blocks: Vec<Block> =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidChain(e.to_string()))?;
    let chain = Chain::from_blocks(blocks).map_err(|e| ApiError::InvalidChain(e.to_string()))?;

    state.store.save_chain(&state.miner_address, &chain)?;
    info!(sender, blocks = chain.len(), "chain replaced");
    Ok((StatusCode::ACCEPTED, Json(chain)).into_response())
}

async fn get_state(State(state): State<AppState>) -> Result<Json<NodeState>, ApiError> {
    Ok(Json(state.store.load_state(&state.miner_address)?))
}

async fn get_balance(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<AccountSummary>, ApiError> {
    let chain = state.store.load_chain(&state.miner_address)?;
    Ok(Json(AccountSummary {
        balance: balance_of(&chain, &account),
        transactions: transactions_for(&chain, &account).cloned().collect(),
        account,
    }))
}
