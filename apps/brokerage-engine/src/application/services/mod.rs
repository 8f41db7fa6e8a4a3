//! Application Services
//!
//! - `ConnectionRegistry`: Per-user broker connection lifecycle
//! - `OrderEngine`: Order synthesis and the order book
//! - `PositionLedger`: Weighted-average-cost positions

mod connection_registry;
mod order_engine;
mod position_ledger;

pub use connection_registry::{ConnectionRegistry, ConnectionRegistryConfig};
pub use order_engine::OrderEngine;
pub use position_ledger::PositionLedger;
