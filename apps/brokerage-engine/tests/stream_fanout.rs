//! Stream Hub Integration Tests
//!
//! Tests cadence, per-client isolation and exactly-once cleanup.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use brokerage_engine::{
    BrokerId, CloseReason, DeliveryError, PriceTick, StreamConfig, StreamHub, StreamRequest,
    SubscriptionState, SyntheticMarketData, TickSink, UserId,
};

fn hub(interval: Duration, client_buffer: usize) -> Arc<StreamHub> {
    Arc::new(StreamHub::new(
        Arc::new(SyntheticMarketData::new()),
        StreamConfig {
            tick_interval: interval,
            client_buffer,
            ..StreamConfig::default()
        },
    ))
}

fn request(user: &str, symbols: &str) -> StreamRequest {
    StreamRequest::from_csv(UserId::new(user), BrokerId::new("oanda"), symbols)
}

/// Sink that accepts a fixed number of ticks, then reports closed.
struct CountingSink {
    delivered: Arc<AtomicUsize>,
    limit: usize,
    live: Arc<AtomicBool>,
}

impl TickSink for CountingSink {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn try_deliver(&self, _tick: PriceTick) -> Result<(), DeliveryError> {
        if self.delivered.fetch_add(1, Ordering::AcqRel) >= self.limit {
            return Err(DeliveryError::Closed);
        }
        Ok(())
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Let spawned subscription tasks run to their next await point.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn drain(rx: &mut mpsc::Receiver<PriceTick>) -> Vec<PriceTick> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

#[tokio::test(start_paused = true)]
async fn ticks_arrive_on_cadence() {
    let period = Duration::from_millis(500);
    let hub = hub(period, 64);
    let (tx, mut rx) = mpsc::channel(64);
    hub.open(request("u1", "EURUSD,AAPL"), tx).unwrap();

    let burst = drain(&mut rx);
    assert_eq!(burst.len(), 2);
    settle().await;

    tokio::time::advance(period - Duration::from_millis(1)).await;
    settle().await;
    assert!(drain(&mut rx).is_empty(), "tick arrived before one interval elapsed");

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    let first_round = drain(&mut rx);
    assert_eq!(first_round.len(), 2);
    assert_eq!(first_round[0].symbol.as_str(), "EURUSD");
    assert_eq!(first_round[1].symbol.as_str(), "AAPL");

    for _ in 0..3 {
        tokio::time::advance(period / 2).await;
        settle().await;
        assert!(drain(&mut rx).is_empty());

        tokio::time::advance(period / 2).await;
        settle().await;
        let round = drain(&mut rx);
        assert_eq!(round.len(), 2);
        assert!(round.iter().all(PriceTick::is_consistent));
    }

    assert_eq!(hub.stats().ticks_sent, 10);
}

#[tokio::test]
async fn subscribers_are_isolated() {
    let hub = hub(Duration::from_millis(30), 64);
    let (tx_a, mut rx_a) = mpsc::channel(64);
    let (tx_b, rx_b) = mpsc::channel(64);

    let a = hub.open(request("a", "EURUSD"), tx_a).unwrap();
    let b = hub.open(request("b", "GBPUSD"), tx_b).unwrap();
    assert_eq!(hub.subscriber_count(), 2);

    drop(rx_b);
    wait_until(|| hub.subscription(&b).is_none()).await;

    assert!(hub.subscription(&a).is_some());
    let first = timeout(Duration::from_secs(1), rx_a.recv()).await.unwrap().unwrap();
    assert_eq!(first.symbol.as_str(), "EURUSD");

    let stats = hub.stats();
    assert_eq!(stats.opened, 2);
    assert_eq!(stats.closed, 1);
    assert_eq!(stats.active, 1);
}

#[tokio::test]
async fn transport_loss_releases_exactly_once() {
    let hub = hub(Duration::from_millis(20), 64);
    let delivered = Arc::new(AtomicUsize::new(0));
    let live = Arc::new(AtomicBool::new(true));

    let id = hub
        .open(
            request("u1", "EURUSD"),
            CountingSink {
                delivered: Arc::clone(&delivered),
                limit: 3,
                live: Arc::clone(&live),
            },
        )
        .unwrap();

    wait_until(|| hub.subscriber_count() == 0).await;

    // The task already released it; explicit closes are no-ops.
    assert!(!hub.close(&id));
    assert!(!hub.close_with(&id, CloseReason::TransportError));
    assert_eq!(hub.stats().closed, 1);
    assert_eq!(hub.stats().ticks_sent, 3);
}

#[tokio::test]
async fn liveness_check_ends_subscription() {
    let hub = hub(Duration::from_millis(20), 64);
    let live = Arc::new(AtomicBool::new(true));

    hub.open(
        request("u1", "EURUSD"),
        CountingSink {
            delivered: Arc::new(AtomicUsize::new(0)),
            limit: usize::MAX,
            live: Arc::clone(&live),
        },
    )
    .unwrap();
    assert_eq!(hub.subscriber_count(), 1);

    live.store(false, Ordering::Release);
    wait_until(|| hub.subscriber_count() == 0).await;
    assert_eq!(hub.stats().closed, 1);
}

#[tokio::test]
async fn slow_consumer_drops_instead_of_blocking() {
    let hub = hub(Duration::from_millis(10), 2);
    let (tx, mut rx) = mpsc::channel(2);
    let id = hub.open(request("u1", "EURUSD,GBPUSD,AAPL"), tx).unwrap();

    wait_until(|| hub.subscription(&id).is_some_and(|info| info.ticks_dropped >= 4)).await;

    let info = hub.subscription(&id).unwrap();
    assert_eq!(info.state, SubscriptionState::Streaming);
    assert_eq!(info.ticks_sent, 2);

    // Draining the queue lets delivery resume.
    rx.recv().await.unwrap();
    rx.recv().await.unwrap();
    wait_until(|| hub.subscription(&id).is_some_and(|info| info.ticks_sent > 2)).await;
}

#[tokio::test]
async fn shutdown_releases_every_subscription() {
    let hub = hub(Duration::from_secs(60), 8);
    let mut receivers = Vec::new();
    for user in ["a", "b", "c"] {
        let (tx, rx) = mpsc::channel(8);
        hub.open(request(user, "EURUSD"), tx).unwrap();
        receivers.push(rx);
    }
    assert_eq!(hub.subscriber_count(), 3);

    hub.shutdown();
    hub.shutdown();

    assert_eq!(hub.subscriber_count(), 0);
    assert_eq!(hub.stats().closed, 3);

    // Each task drops its sender once cancelled.
    for mut rx in receivers {
        let _burst = rx.recv().await.unwrap();
        assert!(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().is_none());
    }
}
