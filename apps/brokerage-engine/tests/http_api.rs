//! HTTP and WebSocket Integration Tests
//!
//! Runs the real server on an ephemeral port and drives it over the wire.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use brokerage_engine::{
    AppState, BrokerAdapter, ConnectionRegistry, ConnectionRegistryConfig, CredentialVault, CrossingPolicy,
    HttpServer, MarketDataSource, OrderEngine, PositionLedger, SimulatedBroker, StreamConfig,
    StreamHub, SyntheticMarketData, create_router,
};

fn app_state(tick_interval: Duration) -> AppState {
    let market_data: Arc<dyn MarketDataSource> = Arc::new(SyntheticMarketData::new());
    let broker: Arc<dyn BrokerAdapter> = Arc::new(SimulatedBroker::new(Arc::clone(&market_data)));
    let registry = ConnectionRegistry::new(
        CredentialVault::new("integration-secret").unwrap(),
        Arc::clone(&broker),
        ConnectionRegistryConfig::default(),
    );
    let engine = OrderEngine::new(
        broker,
        Arc::new(PositionLedger::new()),
        CrossingPolicy::default(),
    );
    let hub = StreamHub::new(
        market_data,
        StreamConfig {
            tick_interval,
            ..StreamConfig::default()
        },
    );
    AppState::new(Arc::new(registry), Arc::new(engine), Arc::new(hub))
}

async fn start_server(
    state: AppState,
) -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let server = HttpServer::new(addr, state, cancel.clone());
    let handle = tokio::spawn(async move {
        server.serve(listener).await.unwrap();
    });
    (addr, cancel, handle)
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn next_json<S>(ws: &mut S) -> serde_json::Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn connect_order_and_position_flow() {
    let app = create_router(app_state(Duration::from_secs(60)));

    let connect = Request::builder()
        .method("POST")
        .uri("/connections/alpaca")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"userId":"u1","credentials":{"apiKey":"k","apiSecret":"s"}}"#,
        ))
        .unwrap();
    let response = app.clone().oneshot(connect).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let order = Request::builder()
        .method("POST")
        .uri("/connections/alpaca/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"userId":"u1","symbol":"AAPL","side":"buy","quantity":"5"}"#,
        ))
        .unwrap();
    let response = app.clone().oneshot(order).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = json(response).await;
    assert_eq!(order["status"], "filled");
    let average: Decimal = order["averagePrice"].as_str().unwrap().parse().unwrap();
    assert_eq!(average, dec!(190));

    let positions = Request::builder()
        .uri("/positions/alpaca?userId=u1")
        .body(Body::empty())
        .unwrap();
    let positions = json(app.oneshot(positions).await.unwrap()).await;
    assert_eq!(positions.as_array().unwrap().len(), 1);
    assert_eq!(positions[0]["symbol"], "AAPL");
    assert_eq!(positions[0]["quantity"], "5");
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = create_router(app_state(Duration::from_secs(60)));
    let request = Request::builder()
        .uri("/orders/oanda/does-not-exist")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn websocket_streams_ticks_until_client_closes() {
    let state = app_state(Duration::from_millis(50));
    let hub = Arc::clone(&state.hub);
    let (addr, cancel, handle) = start_server(state).await;

    let url = format!("ws://{addr}/stream?userId=u1&brokerId=oanda&symbols=eurusd,AAPL");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let subscribed = next_json(&mut ws).await;
    assert_eq!(subscribed["type"], "subscribed");
    assert_eq!(subscribed["symbols"], serde_json::json!(["EURUSD", "AAPL"]));
    assert_eq!(subscribed["intervalMs"], 50);
    assert_eq!(hub.subscriber_count(), 1);

    // Initial burst, then one periodic round.
    let mut symbols = Vec::new();
    for _ in 0..4 {
        let tick = next_json(&mut ws).await;
        assert_eq!(tick["type"], "tick");
        symbols.push(tick["symbol"].as_str().unwrap().to_string());
    }
    assert_eq!(symbols, vec!["EURUSD", "AAPL", "EURUSD", "AAPL"]);

    ws.close(None).await.unwrap();

    timeout(Duration::from_secs(2), async {
        while hub.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(hub.stats().closed, 1);

    cancel.cancel();
    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn websocket_after_shutdown_reports_error_frame() {
    let state = app_state(Duration::from_millis(50));
    let hub = Arc::clone(&state.hub);
    let (addr, cancel, handle) = start_server(state).await;

    hub.shutdown();

    let url = format!("ws://{addr}/stream?userId=u1&brokerId=oanda&symbols=EURUSD");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["code"], "TRANSPORT_ERROR");

    cancel.cancel();
    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
}
