use axum::http::StatusCode;
use hypeharvest::api;
use hypeharvest::db::init_db;
use hypeharvest::domain::{Address, Coin, Fill, TimeMs};
use hypeharvest::{Repository, TradeRebuilder};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const USER: &str = "0x1111111111111111111111111111111111111111";

struct TestApp {
    app: axum::Router,
    repo: Arc<Repository>,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let app = api::create_router(api::AppState::new(repo.clone()));

    TestApp {
        app,
        repo,
        _temp: temp_dir,
    }
}

fn fill(coin: &str, dir: &str, px: &str, sz: &str, time_ms: i64, tid: i64) -> Fill {
    Fill {
        address: Address::new(USER.to_string()),
        coin: Coin::new(coin.to_string()),
        px: px.to_string(),
        sz: sz.to_string(),
        side: "B".to_string(),
        time_ms: TimeMs::new(time_ms),
        start_position: "0".to_string(),
        dir: dir.to_string(),
        closed_pnl: "0".to_string(),
        fee: "0.01".to_string(),
        fee_token: "USDC".to_string(),
        hash: format!("0x{:064x}", tid),
        oid: tid,
        cloid: None,
        crossed: false,
        tid,
    }
}

async fn request(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, body)
}

async fn seed_two_trades(test_app: &TestApp) {
    let mut closing = fill("BTC", "Close Long", "110", "10", 2_000, 2);
    closing.closed_pnl = "100".to_string();
    test_app
        .repo
        .insert_fills_batch(&[
            fill("BTC", "Open Long", "100", "10", 1_000, 1),
            closing,
            fill("ETH", "Open Short", "3000", "1", 3_000, 3),
            fill("ETH", "Close Short", "2900", "1", 4_000, 4),
        ])
        .await
        .unwrap();
    TradeRebuilder::rebuild(&test_app.repo, &Address::new(USER.to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_trades_response_has_required_fields() {
    let test_app = setup_test_app().await;
    seed_two_trades(&test_app).await;

    let (status, body) = request(test_app.app, &format!("/v1/trades?user={}", USER)).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let trades = json["trades"].as_array().unwrap();
    assert_eq!(trades.len(), 2);

    let trade = &trades[0];
    assert_eq!(trade["coin"], "BTC");
    assert_eq!(trade["marginMode"], "isolated");
    assert_eq!(trade["direction"], "long");
    assert_eq!(trade["size"], "10");
    assert_eq!(trade["entryPrice"], "100");
    assert_eq!(trade["closePrice"], "110");
    assert_eq!(trade["pnl"], "100");
    assert_eq!(trade["totalFee"], "0.02");
    assert_eq!(trade["startTimeMs"], 1_000);
    assert_eq!(trade["endTimeMs"], 2_000);
    assert_eq!(trade["fillCount"], 2);
}

#[tokio::test]
async fn test_trades_filter_by_coin() {
    let test_app = setup_test_app().await;
    seed_two_trades(&test_app).await;

    let (status, body) = request(
        test_app.app,
        &format!("/v1/trades?user={}&coin=ETH", USER),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let trades = json["trades"].as_array().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0]["direction"], "short");
}

#[tokio::test]
async fn test_trades_response_deterministic() {
    let test_app = setup_test_app().await;
    seed_two_trades(&test_app).await;

    let uri = format!("/v1/trades?user={}", USER);
    let (_s1, b1) = request(test_app.app.clone(), &uri).await;
    let (_s2, b2) = request(test_app.app, &uri).await;

    assert_eq!(b1, b2, "Responses must be byte-identical");
}

#[tokio::test]
async fn test_mixed_case_address_is_normalized() {
    let test_app = setup_test_app().await;
    let lower = "0x00000000000000000000000000000000000000ab";
    let mut open = fill("BTC", "Open Long", "100", "1", 1_000, 1);
    let mut close = fill("BTC", "Close Long", "101", "1", 2_000, 2);
    open.address = Address::new(lower.to_string());
    close.address = Address::new(lower.to_string());
    test_app
        .repo
        .insert_fills_batch(&[open, close])
        .await
        .unwrap();
    TradeRebuilder::rebuild(&test_app.repo, &Address::new(lower.to_string()))
        .await
        .unwrap();

    let (status, body) = request(
        test_app.app,
        "/v1/trades?user=0x00000000000000000000000000000000000000AB",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["trades"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_user_is_bad_request() {
    let test_app = setup_test_app().await;

    for uri in [
        "/v1/trades?user=not-an-address",
        "/v1/trades?user=0xZZZ",
        "/v1/fills/watermark?user=0x",
    ] {
        let (status, body) = request(test_app.app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri {}", uri);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string());
    }
}

#[tokio::test]
async fn test_watermark_reports_latest_fill() {
    let test_app = setup_test_app().await;

    let (status, body) = request(
        test_app.app.clone(),
        &format!("/v1/fills/watermark?user={}", USER),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["latestFillTimeMs"].is_null());
    assert_eq!(json["fillCount"], 0);

    seed_two_trades(&test_app).await;

    let (_, body) = request(
        test_app.app,
        &format!("/v1/fills/watermark?user={}", USER),
    )
    .await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["user"], USER);
    assert_eq!(json["latestFillTimeMs"], 4_000);
    assert_eq!(json["fillCount"], 4);
}

#[tokio::test]
async fn test_health_and_ready() {
    let test_app = setup_test_app().await;

    let (status, body) = request(test_app.app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");

    let (status, _) = request(test_app.app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
}
