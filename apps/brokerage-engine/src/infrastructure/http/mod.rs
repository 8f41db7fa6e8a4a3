//! HTTP and WebSocket Server
//!
//! JSON routes over the connection registry and order engine, plus the
//! `/stream` WebSocket endpoint backed by the stream hub.
//!
//! # Endpoints
//!
//! - `GET /health`, `GET /healthz` - Status and liveness
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /brokers` - Supported broker table
//! - `GET /connections?userId=` - Connection records for a user
//! - `POST /connections/{brokerId}[/oauth|/disconnect|/sync|/orders]`
//! - `GET /orders/{brokerId}?userId=`, `GET /orders/{brokerId}/{orderId}`
//! - `GET /positions/{brokerId}?userId=`
//! - `GET /stream?userId=&brokerId=&symbols=A,B` - WebSocket tick stream

mod routes;
mod state;
mod stream;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use routes::{ApiError, create_router};
pub use state::AppState;
pub use stream::{StreamFrame, StreamQuery};

use crate::error::EngineError;

/// HTTP server bound to one address.
#[derive(Debug)]
pub struct HttpServer {
    addr: SocketAddr,
    state: AppState,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(addr: SocketAddr, state: AppState, cancel: CancellationToken) -> Self {
        Self {
            addr,
            state,
            cancel,
        }
    }

    /// Bind and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the server encounters a
    /// fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.addr, e.to_string()))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError::ServerFailed` on a fatal server error.
    pub async fn serve(self, listener: TcpListener) -> Result<(), HttpServerError> {
        let local = listener.local_addr().unwrap_or(self.addr);
        tracing::info!(addr = %local, "HTTP server listening");

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to address.
    #[error("failed to bind HTTP server to {0}: {1}")]
    BindFailed(SocketAddr, String),
    /// Server failed during operation.
    #[error("HTTP server failed: {0}")]
    ServerFailed(String),
}

impl From<HttpServerError> for EngineError {
    fn from(err: HttpServerError) -> Self {
        Self::internal(err.to_string())
    }
}
