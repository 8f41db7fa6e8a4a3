//! Domain Layer - Core ledger types and business rules.
//!
//! Pure types with serialization support. Nothing in this layer performs
//! I/O or holds shared state.

/// Shared value objects (identifiers).
pub mod shared;

/// Broker connections, credentials and the supported-broker table.
pub mod connection;

/// Orders, order requests and fills.
pub mod order;

/// Positions and the weighted-average-cost rule.
pub mod position;

/// Market data price ticks.
pub mod market;
