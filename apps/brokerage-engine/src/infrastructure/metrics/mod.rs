//! Prometheus Metrics Module
//!
//! Exposes engine metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Orders**: Orders placed by side and failures by error code
//! - **Connections**: Connection lifecycle events
//! - **Stream**: Active subscribers, ticks sent and dropped, closes by reason
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::order::OrderSide;
use crate::error::ErrorCode;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Repeated calls return the handle installed by the first call.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Orders
    describe_counter!(
        "brokerage_orders_placed_total",
        "Total orders synthesized, by side"
    );
    describe_counter!(
        "brokerage_order_failures_total",
        "Total failed order placements, by error code"
    );

    // Connections
    describe_counter!(
        "brokerage_connections_total",
        "Connection lifecycle events, by event"
    );

    // Stream
    describe_gauge!(
        "brokerage_stream_subscribers",
        "Number of active stream subscriptions"
    );
    describe_counter!(
        "brokerage_stream_ticks_sent_total",
        "Total ticks enqueued to subscribers"
    );
    describe_counter!(
        "brokerage_stream_ticks_dropped_total",
        "Total ticks dropped because a subscriber queue was full"
    );
    describe_counter!(
        "brokerage_stream_closed_total",
        "Total closed subscriptions, by reason"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Connection lifecycle event labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// OAuth flow started.
    OAuthInit,
    /// Connection established or replaced.
    Connect,
    /// Connection marked disconnected.
    Disconnect,
    /// Account sync recorded.
    Sync,
}

impl ConnectionEvent {
    const fn as_str(self) -> &'static str {
        match self {
            Self::OAuthInit => "oauth_init",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Sync => "sync",
        }
    }
}

/// Record a synthesized order.
pub fn record_order_placed(side: OrderSide) {
    counter!("brokerage_orders_placed_total", "side" => side.as_str()).increment(1);
}

/// Record a failed order placement.
pub fn record_order_failure(code: ErrorCode) {
    counter!("brokerage_order_failures_total", "code" => code.reason()).increment(1);
}

/// Record a connection lifecycle event.
pub fn record_connection_event(event: ConnectionEvent) {
    counter!("brokerage_connections_total", "event" => event.as_str()).increment(1);
}

/// Update the active subscriber gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_stream_subscribers(count: usize) {
    gauge!("brokerage_stream_subscribers").set(count as f64);
}

/// Record ticks enqueued to a subscriber.
pub fn record_ticks_sent(count: u64) {
    counter!("brokerage_stream_ticks_sent_total").increment(count);
}

/// Record ticks dropped for a slow subscriber.
pub fn record_ticks_dropped(count: u64) {
    counter!("brokerage_stream_ticks_dropped_total").increment(count);
}

/// Record a closed subscription.
pub fn record_stream_closed(reason: &'static str) {
    counter!("brokerage_stream_closed_total", "reason" => reason).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
