#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Brokerage Engine - Connection, Order and Position Ledger
//!
//! Holds the authoritative in-process state for linked brokerage accounts:
//! broker connections, immutable order records, weighted-average-cost
//! positions, and a fan-out hub that streams price ticks to many clients.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Connection, order, position and price tick types
//!   - `connection`: Broker connections and the supported-broker table
//!   - `order`: Order drafts, validated requests, fills and order records
//!   - `position`: Position bookkeeping and the average-price rule
//!   - `market`: Price ticks
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Broker adapter, market data source, tick sink
//!   - `services`: Connection registry, order engine, position ledger
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `vault`: AES-GCM credential sealing
//!   - `broker`: Simulated broker (handshake + instant fills)
//!   - `market_data`: Synthetic tick generator
//!   - `stream`: Per-subscription fan-out hub
//!   - `http`: JSON routes and WebSocket streaming
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! connect ──► ConnectionRegistry ──► CredentialVault
//! order   ──► OrderEngine ──► BrokerAdapter (fill) ──► PositionLedger
//! stream  ──► StreamHub ──► MarketDataSource ──► TickSink (client 1..N)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Error codes and the engine-wide error type.
pub mod error;

/// Domain layer - Core ledger types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{EngineError, ErrorCode, ErrorResponse};

// Domain types
pub use domain::connection::{
    BrokerConnection, BrokerCredentials, ConnectionStatus, ConnectionView, OAuthInit,
    SUPPORTED_BROKERS, SealedCredentials, SessionTokens, SupportedBroker,
};
pub use domain::market::PriceTick;
pub use domain::order::{
    Fill, Order, OrderDraft, OrderRequest, OrderSide, OrderStatus, OrderType,
};
pub use domain::position::{CrossingPolicy, Position, PositionKey};
pub use domain::shared::{BrokerId, ClientId, OrderId, Symbol, UserId};

// Application
pub use application::ports::{
    BrokerAdapter, BrokerError, DeliveryError, MarketDataSource, TickSink,
};
pub use application::services::{
    ConnectionRegistry, ConnectionRegistryConfig, OrderEngine, PositionLedger,
};

// Infrastructure
pub use infrastructure::broker::SimulatedBroker;
pub use infrastructure::config::{
    ConfigError, EngineConfig, LedgerSettings, ServerSettings, StreamSettings, VaultSecret,
};
pub use infrastructure::http::{AppState, HttpServer, HttpServerError, create_router};
pub use infrastructure::market_data::SyntheticMarketData;
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::stream::{
    CloseReason, HubStats, StreamConfig, StreamHub, StreamRequest, SubscriptionInfo,
    SubscriptionState,
};
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
pub use infrastructure::vault::{CredentialVault, VaultError};
