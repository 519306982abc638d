use agora_chain::{BalanceOracle, ChainClient, ChainError};
use agora_types::WalletAddress;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::time::Duration;

async fn balance(Path(address): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
    match address.as_str() {
        "rich" => Ok(Json(json!({ "address": address, "balance": 2500 }))),
        "whale" => Ok(Json(json!({ "address": address, "balance": "900000000000" }))),
        "broken" => Err(StatusCode::INTERNAL_SERVER_ERROR),
        "garbled" => Ok(Json(json!({ "nope": true }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn spawn_chain() -> String {
    let app = Router::new()
        .route("/balance/:address", get(balance))
        .route("/health", get(|| async { "ok" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn wallet(s: &str) -> WalletAddress {
    WalletAddress::parse(s).unwrap()
}

#[tokio::test]
async fn reads_numeric_and_string_balances() {
    let client = ChainClient::new(spawn_chain().await).unwrap();
    assert_eq!(client.balance(&wallet("rich")).await.unwrap(), 2500);
    assert_eq!(
        client.balance(&wallet("whale")).await.unwrap(),
        900_000_000_000
    );
}

#[tokio::test]
async fn unknown_address_has_zero_balance() {
    let client = ChainClient::new(spawn_chain().await).unwrap();
    assert_eq!(client.balance(&wallet("nobody")).await.unwrap(), 0);
}

#[tokio::test]
async fn upstream_errors_are_classified() {
    let client = ChainClient::new(spawn_chain().await).unwrap();
    assert!(matches!(
        client.balance(&wallet("broken")).await,
        Err(ChainError::RequestFailed(_))
    ));
    assert!(matches!(
        client.balance(&wallet("garbled")).await,
        Err(ChainError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn health_probe() {
    let client = ChainClient::new(spawn_chain().await).unwrap();
    client.health().await.unwrap();
}

#[tokio::test]
async fn unreachable_chain_is_unavailable() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        ChainClient::with_timeout(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let err = client.health().await.unwrap_err();
    assert!(err.is_unavailable(), "got {err:?}");
}

#[tokio::test]
async fn slow_chain_hits_the_configured_timeout() {
    let app = Router::new().route(
        "/health",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "ok"
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let client =
        ChainClient::with_timeout(format!("http://{addr}"), Duration::from_millis(200)).unwrap();
    let started = std::time::Instant::now();
    let err = client.health().await.unwrap_err();
    assert!(err.is_unavailable(), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(4));
}
