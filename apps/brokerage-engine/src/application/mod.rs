//! Application Layer
//!
//! Orchestrates the domain through services and defines the ports the
//! infrastructure layer implements:
//!
//! - **Ports**: Broker adapter, market data source, tick sink
//! - **Services**: Connection registry, order engine, position ledger

pub mod ports;
pub mod services;
