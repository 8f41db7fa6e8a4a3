//! Stream subscription types.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::shared::{BrokerId, ClientId, Symbol, UserId};

/// Hub settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Push cadence.
    pub tick_interval: Duration,
    /// Per-subscriber queue bound.
    pub client_buffer: usize,
    /// Bound on a single transport write.
    pub write_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            client_buffer: 64,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// A client's request to stream a set of symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Requesting user.
    pub user_id: UserId,
    /// Broker context.
    pub broker_id: BrokerId,
    /// Symbols to stream, deduplicated, in request order.
    pub symbols: Vec<Symbol>,
}

impl StreamRequest {
    /// Build a request, normalizing and deduplicating symbols.
    #[must_use]
    pub fn new<I, S>(user_id: UserId, broker_id: BrokerId, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<Symbol> = Vec::new();
        for raw in symbols {
            let symbol = Symbol::normalized(raw.as_ref());
            if !symbol.is_blank() && !unique.contains(&symbol) {
                unique.push(symbol);
            }
        }
        Self {
            user_id,
            broker_id,
            symbols: unique,
        }
    }

    /// Build a request from a comma-separated symbol list.
    #[must_use]
    pub fn from_csv(user_id: UserId, broker_id: BrokerId, symbols: &str) -> Self {
        Self::new(user_id, broker_id, symbols.split(','))
    }
}

/// Subscription lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    /// Registered, initial burst in progress.
    Open,
    /// Periodic pushes running.
    Streaming,
    /// Terminal.
    Closed,
}

impl SubscriptionState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Streaming => 1,
            Self::Closed => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Streaming,
            _ => Self::Closed,
        }
    }
}

/// Why a subscription ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The transport went away or failed a liveness check.
    TransportClosed,
    /// A transport write failed or timed out.
    TransportError,
    /// Closed explicitly through the hub.
    ClientClosed,
    /// The hub shut down.
    Shutdown,
}

impl CloseReason {
    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TransportClosed => "transport_closed",
            Self::TransportError => "transport_error",
            Self::ClientClosed => "client_closed",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Counters shared between a subscription's task and its registry entry.
#[derive(Debug)]
pub(crate) struct SubscriptionCounters {
    state: AtomicU8,
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl SubscriptionCounters {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(SubscriptionState::Open.to_u8()),
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: SubscriptionState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    /// Move from `from` to `to`. Fails if another path changed the state first.
    pub(crate) fn transition(&self, from: SubscriptionState, to: SubscriptionState) -> bool {
        self.state
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn add_sent(&self, n: u64) {
        self.sent.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a live subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    /// Subscription id.
    pub client_id: ClientId,
    /// Requesting user.
    pub user_id: UserId,
    /// Broker context.
    pub broker_id: BrokerId,
    /// Streamed symbols.
    pub symbols: Vec<Symbol>,
    /// Push cadence in milliseconds.
    pub interval_ms: u64,
    /// Lifecycle state.
    pub state: SubscriptionState,
    /// Registration time.
    pub opened_at: DateTime<Utc>,
    /// Ticks enqueued.
    pub ticks_sent: u64,
    /// Ticks dropped on a full queue.
    pub ticks_dropped: u64,
}

/// Hub-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    /// Subscriptions ever registered.
    pub opened: u64,
    /// Subscriptions released.
    pub closed: u64,
    /// Subscriptions currently registered.
    pub active: usize,
    /// Ticks enqueued across all subscriptions.
    pub ticks_sent: u64,
    /// Ticks dropped across all subscriptions.
    pub ticks_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_normalizes_and_dedupes() {
        let request = StreamRequest::from_csv(
            UserId::new("u"),
            BrokerId::new("oanda"),
            " eurusd, GBPUSD,,EURUSD ,",
        );
        let symbols: Vec<&str> = request.symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(symbols, vec!["EURUSD", "GBPUSD"]);
    }

    #[test]
    fn blank_csv_yields_no_symbols() {
        let request = StreamRequest::from_csv(UserId::new("u"), BrokerId::new("oanda"), " , ");
        assert!(request.symbols.is_empty());
    }

    #[test]
    fn state_round_trips_through_counter() {
        let counters = SubscriptionCounters::new();
        assert_eq!(counters.state(), SubscriptionState::Open);
        counters.set_state(SubscriptionState::Streaming);
        assert_eq!(counters.state(), SubscriptionState::Streaming);
        counters.set_state(SubscriptionState::Closed);
        assert_eq!(counters.state(), SubscriptionState::Closed);
        assert!(!counters.transition(SubscriptionState::Open, SubscriptionState::Streaming));
        assert_eq!(counters.state(), SubscriptionState::Closed);
    }

    #[test]
    fn close_reason_labels() {
        assert_eq!(CloseReason::TransportClosed.as_str(), "transport_closed");
        assert_eq!(CloseReason::Shutdown.as_str(), "shutdown");
    }
}
