//! Stream Fan-Out Hub
//!
//! Every subscription is a task with its own interval, running under a child
//! of the hub's shutdown token:
//!
//! ```text
//! open ──► OPEN ──(initial burst)──► STREAMING ──► CLOSED
//!                                        │  ▲
//!                                        └──┘ tick every interval
//! ```
//!
//! Ticks are handed to the subscriber's [`TickSink`] without waiting. A full
//! queue drops the tick and counts it; a closed sink ends the subscription.
//! The registry entry is released exactly once, by whichever of the task,
//! [`StreamHub::close`] or [`StreamHub::shutdown`] gets there first.

mod subscription;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use subscription::{
    CloseReason, HubStats, StreamConfig, StreamRequest, SubscriptionInfo, SubscriptionState,
};
use subscription::SubscriptionCounters;

use crate::application::ports::{DeliveryError, MarketDataSource, TickSink};
use crate::domain::shared::{BrokerId, ClientId, Symbol, UserId};
use crate::error::EngineError;
use crate::infrastructure::metrics::{
    record_stream_closed, record_ticks_dropped, record_ticks_sent, set_stream_subscribers,
};

// =============================================================================
// Registry Entry
// =============================================================================

struct SubscriptionEntry {
    user_id: UserId,
    broker_id: BrokerId,
    symbols: Arc<[Symbol]>,
    opened_at: DateTime<Utc>,
    token: CancellationToken,
    counters: Arc<SubscriptionCounters>,
}

impl SubscriptionEntry {
    fn snapshot(&self, client_id: &ClientId, interval_ms: u64) -> SubscriptionInfo {
        SubscriptionInfo {
            client_id: client_id.clone(),
            user_id: self.user_id.clone(),
            broker_id: self.broker_id.clone(),
            symbols: self.symbols.to_vec(),
            interval_ms,
            state: self.counters.state(),
            opened_at: self.opened_at,
            ticks_sent: self.counters.sent(),
            ticks_dropped: self.counters.dropped(),
        }
    }
}

// =============================================================================
// Stream Hub
// =============================================================================

/// Registry of live stream subscriptions.
pub struct StreamHub {
    market_data: Arc<dyn MarketDataSource>,
    config: StreamConfig,
    subscriptions: DashMap<ClientId, SubscriptionEntry>,
    shutdown: CancellationToken,
    opened: AtomicU64,
    closed: AtomicU64,
    ticks_sent: AtomicU64,
    ticks_dropped: AtomicU64,
}

impl std::fmt::Debug for StreamHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHub")
            .field("config", &self.config)
            .field("subscriptions", &self.subscriptions.len())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl StreamHub {
    /// Create a hub.
    #[must_use]
    pub fn new(market_data: Arc<dyn MarketDataSource>, config: StreamConfig) -> Self {
        Self {
            market_data,
            config,
            subscriptions: DashMap::new(),
            shutdown: CancellationToken::new(),
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            ticks_sent: AtomicU64::new(0),
            ticks_dropped: AtomicU64::new(0),
        }
    }

    /// Hub settings.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Register a subscription, send the initial burst and start streaming.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `INVALID_REQUEST` if the symbol set is empty
    /// - `TRANSPORT_ERROR` if the hub is shut down or the sink closes during
    ///   the initial burst
    pub fn open<S>(self: &Arc<Self>, request: StreamRequest, sink: S) -> Result<ClientId, EngineError>
    where
        S: TickSink,
    {
        if request.symbols.is_empty() {
            return Err(EngineError::invalid_request(
                "at least one symbol is required to stream",
            ));
        }
        if self.shutdown.is_cancelled() {
            return Err(EngineError::transport("stream hub is shut down"));
        }

        let client_id = ClientId::generate();
        let token = self.shutdown.child_token();
        let counters = Arc::new(SubscriptionCounters::new());
        let symbols: Arc<[Symbol]> = request.symbols.into();

        self.subscriptions.insert(
            client_id.clone(),
            SubscriptionEntry {
                user_id: request.user_id.clone(),
                broker_id: request.broker_id.clone(),
                symbols: Arc::clone(&symbols),
                opened_at: Utc::now(),
                token: token.clone(),
                counters: Arc::clone(&counters),
            },
        );
        self.opened.fetch_add(1, Ordering::Relaxed);
        set_stream_subscribers(self.subscriptions.len());

        if !self.push(&sink, &symbols, &counters) {
            self.release(&client_id, CloseReason::TransportClosed);
            return Err(EngineError::transport("transport closed during initial burst")
                .with_context("client_id", client_id.as_str()));
        }

        // Shutdown may have released the entry during the burst.
        if !counters.transition(SubscriptionState::Open, SubscriptionState::Streaming) {
            return Err(EngineError::transport("stream hub shut down during initial burst")
                .with_context("client_id", client_id.as_str()));
        }
        tracing::info!(
            client_id = %client_id,
            user_id = %request.user_id,
            broker_id = %request.broker_id,
            symbols = symbols.len(),
            "Stream subscription opened"
        );

        let hub = Arc::clone(self);
        let id = client_id.clone();
        tokio::spawn(async move {
            let reason = hub.run(&sink, &symbols, &counters, &token).await;
            hub.release(&id, reason);
        });

        Ok(client_id)
    }

    async fn run<S: TickSink>(
        &self,
        sink: &S,
        symbols: &[Symbol],
        counters: &SubscriptionCounters,
        token: &CancellationToken,
    ) -> CloseReason {
        let period = self.config.tick_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    return if self.shutdown.is_cancelled() {
                        CloseReason::Shutdown
                    } else {
                        CloseReason::ClientClosed
                    };
                }
                _ = interval.tick() => {
                    if !sink.is_live() {
                        return CloseReason::TransportClosed;
                    }
                    if !self.push(sink, symbols, counters) {
                        return CloseReason::TransportClosed;
                    }
                }
            }
        }
    }

    /// Push one tick per symbol. Returns `false` once the sink reports closed.
    fn push<S: TickSink>(&self, sink: &S, symbols: &[Symbol], counters: &SubscriptionCounters) -> bool {
        let mut sent = 0u64;
        let mut dropped = 0u64;
        let mut closed = false;

        for symbol in symbols {
            match sink.try_deliver(self.market_data.tick(symbol)) {
                Ok(()) => sent += 1,
                Err(DeliveryError::Backpressure) => dropped += 1,
                Err(DeliveryError::Closed) => {
                    closed = true;
                    break;
                }
            }
        }

        if sent > 0 {
            counters.add_sent(sent);
            self.ticks_sent.fetch_add(sent, Ordering::Relaxed);
            record_ticks_sent(sent);
        }
        if dropped > 0 {
            counters.add_dropped(dropped);
            self.ticks_dropped.fetch_add(dropped, Ordering::Relaxed);
            record_ticks_dropped(dropped);
            tracing::debug!(dropped, "Subscriber queue full, ticks dropped");
        }

        !closed
    }

    /// Remove a subscription's entry and cancel its task.
    ///
    /// Returns `false` if the entry was already released.
    fn release(&self, client_id: &ClientId, reason: CloseReason) -> bool {
        let Some((_, entry)) = self.subscriptions.remove(client_id) else {
            return false;
        };

        entry.counters.set_state(SubscriptionState::Closed);
        entry.token.cancel();
        self.closed.fetch_add(1, Ordering::Relaxed);
        record_stream_closed(reason.as_str());
        set_stream_subscribers(self.subscriptions.len());

        tracing::info!(
            client_id = %client_id,
            user_id = %entry.user_id,
            reason = reason.as_str(),
            ticks_sent = entry.counters.sent(),
            ticks_dropped = entry.counters.dropped(),
            "Stream subscription closed"
        );
        true
    }

    /// Close a subscription explicitly.
    ///
    /// Returns `false` if it was already closed or never existed.
    pub fn close(&self, client_id: &ClientId) -> bool {
        self.release(client_id, CloseReason::ClientClosed)
    }

    /// Close a subscription whose transport failed.
    pub fn close_with(&self, client_id: &ClientId, reason: CloseReason) -> bool {
        self.release(client_id, reason)
    }

    /// Cancel every subscription and refuse new ones.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let ids: Vec<ClientId> = self
            .subscriptions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let released = ids
            .iter()
            .filter(|id| self.release(id, CloseReason::Shutdown))
            .count();

        tracing::info!(released, "Stream hub shut down");
    }

    /// Whether [`StreamHub::shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Snapshot of one subscription.
    #[must_use]
    pub fn subscription(&self, client_id: &ClientId) -> Option<SubscriptionInfo> {
        let interval_ms = duration_ms(self.config.tick_interval);
        self.subscriptions
            .get(client_id)
            .map(|entry| entry.value().snapshot(client_id, interval_ms))
    }

    /// Snapshots of every live subscription.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let interval_ms = duration_ms(self.config.tick_interval);
        self.subscriptions
            .iter()
            .map(|entry| entry.value().snapshot(entry.key(), interval_ms))
            .collect()
    }

    /// Hub-wide counters.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            opened: self.opened.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            active: self.subscriptions.len(),
            ticks_sent: self.ticks_sent.load(Ordering::Relaxed),
            ticks_dropped: self.ticks_dropped.load(Ordering::Relaxed),
        }
    }
}

fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
