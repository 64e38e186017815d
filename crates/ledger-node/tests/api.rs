use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use ledger_core::coordinator::CoordinatorConfig;
use ledger_core::gateway::NodeStore;
use ledger_core::{Block, BlockData, Chain, Transaction};
use ledger_node::api::{router, AppState};
use ledger_node::constants::NODE_URL_HEADER;
use ledger_storage::SledStore;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

const MINER: &str = "miner-1";
const SELF_URL: &str = "http://node-1:5000";
const PEER_URL: &str = "http://node-2:5000";

fn setup() -> (TempDir, Arc<SledStore>, Router) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = Arc::new(SledStore::open(temp_dir.path()).expect("Failed to open SledStore"));
    let config = CoordinatorConfig::new(MINER, SELF_URL, vec![PEER_URL.to_string()]);
    let app = router(AppState::new(store.clone(), &config));
    (temp_dir, store, app)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn post_transaction(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/transaction")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put_chain(sender: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PUT")
        .uri("/blockchain")
        .header("content-type", "application/json");
    if let Some(sender) = sender {
        builder = builder.header(NODE_URL_HEADER, sender);
    }
    builder.body(Body::from(body)).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn extended(chain: &Chain) -> Chain {
    let last = chain.last().unwrap();
    let mut next = chain.clone();
    next.append(Block {
        index: last.index + 1,
        timestamp: last.timestamp + 1.0,
        data: BlockData {
            nonce: last.data.nonce + 1,
            transactions: vec![
                Transaction::transfer("network", MINER, 0.5, last.timestamp),
                Transaction::transfer("network", "eve", 10.0, last.timestamp),
            ],
        },
        previous_hash: last.content_hash(),
    })
    .unwrap();
    next
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, _store, app) = setup();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"status": "ok"}));
}

#[tokio::test]
async fn valid_transaction_is_queued() {
    let (_dir, store, app) = setup();
    let (status, body) = send(
        &app,
        post_transaction(json!({"from": "eve", "to": "bob", "amount": 5.0, "transaction_fee": 0.01})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let pending = store.load_state(MINER).unwrap().pending_transactions;
    assert_eq!(pending.len(), 1);
    let tx = &pending[0];
    assert_eq!((tx.from.as_str(), tx.to.as_str()), ("eve", "bob"));
    assert_eq!(tx.transaction_fee, Some(0.01));
    assert!(tx.timestamp > 0.0);
    assert_eq!(String::from_utf8(body).unwrap(), format!("Transaction ID: {}", tx.id()));
}

#[tokio::test]
async fn invalid_transactions_are_rejected() {
    let (_dir, store, app) = setup();
    for body in [
        json!({"from": "eve", "amount": 5.0, "transaction_fee": 1.0}),
        json!({"to": "bob", "amount": 5.0, "transaction_fee": 1.0}),
        json!({"from": "eve", "to": "bob", "amount": 0.0, "transaction_fee": 1.0}),
        json!({"from": "eve", "to": "bob", "amount": 5.0, "transaction_fee": 0.001}),
        json!({"from": "eve", "to": "bob", "amount": 5.0}),
    ] {
        let (status, _) = send(&app, post_transaction(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let request = Request::builder()
        .method("POST")
        .uri("/transaction")
        .body(Body::from("not json"))
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::BAD_REQUEST);

    assert!(store.load_state(MINER).unwrap().pending_transactions.is_empty());
}

#[tokio::test]
async fn blockchain_starts_at_genesis() {
    let (_dir, store, app) = setup();
    let (status, body) = send(&app, get("/blockchain")).await;
    assert_eq!(status, StatusCode::OK);

    let blocks: Value = serde_json::from_slice(&body).unwrap();
    let blocks = blocks.as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["index"], 0);
    assert_eq!(blocks[0]["previous_hash"], "0".repeat(64));
    assert_eq!(blocks[0]["data"]["transactions"][0]["to"], "network");

    // the genesis block is persisted, not regenerated
    let stored = store.load_chain(MINER).unwrap();
    let (_, again) = send(&app, get("/blockchain")).await;
    assert_eq!(serde_json::from_slice::<Chain>(&again).unwrap(), stored);
}

#[tokio::test]
async fn chain_from_known_peer_replaces_local() {
    let (_dir, store, app) = setup();
    let chain = extended(&Chain::with_genesis());

    let (status, _) = send(&app, put_chain(Some(PEER_URL), serde_json::to_string(&chain).unwrap())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(store.load_chain(MINER).unwrap(), chain);

    let (status, body) = send(&app, get("/balance/eve")).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summary["balance"], 10.0);
    assert_eq!(summary["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn chain_from_unknown_sender_is_refused() {
    let (_dir, store, app) = setup();
    let body = serde_json::to_string(&Chain::with_genesis()).unwrap();

    let (status, _) = send(&app, put_chain(Some("http://intruder:5000"), body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, put_chain(None, body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(store.load_chain(MINER).unwrap().is_empty());
}

#[tokio::test]
async fn malformed_chains_are_refused() {
    let (_dir, store, app) = setup();
    let (status, _) = send(&app, put_chain(Some(PEER_URL), "[]".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut blocks = extended(&Chain::with_genesis()).into_blocks();
    blocks[1].previous_hash = "f".repeat(64);
    let (status, _) = send(&app, put_chain(Some(PEER_URL), serde_json::to_string(&blocks).unwrap())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, put_chain(Some(PEER_URL), "{\"index\": 0}".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.load_chain(MINER).unwrap().is_empty());
}

#[tokio::test]
async fn state_snapshot_is_served() {
    let (_dir, store, app) = setup();
    store
        .update_state(MINER, &mut |s| s.currently_mining = true)
        .unwrap();
    let (status, body) = send(&app, get("/state")).await;
    assert_eq!(status, StatusCode::OK);
    let state: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(state["miner_account_address"], MINER);
    assert_eq!(state["currently_mining"], true);
    assert!(state["pending_transactions"].as_array().unwrap().is_empty());
}
