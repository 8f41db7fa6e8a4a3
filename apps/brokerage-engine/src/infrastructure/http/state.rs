//! Shared router state.

use std::sync::Arc;
use std::time::Instant;

use crate::application::services::{ConnectionRegistry, OrderEngine};
use crate::infrastructure::stream::StreamHub;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Broker connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Orders and positions.
    pub engine: Arc<OrderEngine>,
    /// Live stream subscriptions.
    pub hub: Arc<StreamHub>,
    version: &'static str,
    started_at: Instant,
}

impl AppState {
    /// Create state stamped with the current time.
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        engine: Arc<OrderEngine>,
        hub: Arc<StreamHub>,
    ) -> Self {
        Self {
            registry,
            engine,
            hub,
            version: env!("CARGO_PKG_VERSION"),
            started_at: Instant::now(),
        }
    }

    /// Crate version.
    #[must_use]
    pub const fn version(&self) -> &'static str {
        self.version
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .field("hub", &self.hub)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
