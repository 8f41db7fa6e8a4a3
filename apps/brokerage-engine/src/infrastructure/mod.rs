//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the transport,
//! configuration and observability plumbing.

/// AES-GCM credential sealing.
pub mod vault;

/// Simulated broker adapter.
pub mod broker;

/// Synthetic market data source.
pub mod market_data;

/// Per-subscription tick fan-out.
pub mod stream;

/// JSON routes and WebSocket streaming.
pub mod http;

/// Environment configuration.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
