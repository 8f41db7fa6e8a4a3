//! Application Ports (Driven)
//!
//! Interfaces the engine uses to reach brokers, price sources and
//! streaming transports.

mod broker_port;
mod market_data_port;
mod tick_sink_port;

pub use broker_port::{BrokerAdapter, BrokerError};
#[cfg(test)]
pub use broker_port::MockBrokerAdapter;
pub use market_data_port::MarketDataSource;
pub use tick_sink_port::{DeliveryError, TickSink};
