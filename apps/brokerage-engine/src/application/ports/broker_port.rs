//! Broker Port (Driven Port)
//!
//! Handshake and order execution against a broker. The engine ships a
//! simulated implementation; a real integration plugs in here.

use async_trait::async_trait;

use crate::domain::connection::{BrokerCredentials, SessionTokens, SupportedBroker};
use crate::domain::order::{Fill, OrderRequest};
use crate::error::{EngineError, ErrorCode};

/// Broker port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Broker refused the credentials.
    #[error("Broker rejected credentials: {reason}")]
    AuthRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Broker refused the order.
    #[error("Order rejected: {reason}")]
    Rejected {
        /// Rejection reason.
        reason: String,
    },

    /// Broker could not be reached.
    #[error("Broker unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },
}

impl From<BrokerError> for EngineError {
    fn from(err: BrokerError) -> Self {
        let code = match &err {
            BrokerError::AuthRejected { .. } => ErrorCode::AuthRejected,
            BrokerError::Rejected { .. } => ErrorCode::OrderRejected,
            BrokerError::Unavailable { .. } => ErrorCode::BrokerUnavailable,
        };
        Self::new(code, err.to_string())
    }
}

/// Port for broker interactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Adapter name for logs.
    fn name(&self) -> &'static str;

    /// Exchange credentials for session tokens.
    async fn handshake(
        &self,
        broker: &SupportedBroker,
        credentials: &BrokerCredentials,
    ) -> Result<SessionTokens, BrokerError>;

    /// Execute a validated order and report the fill.
    async fn execute(&self, request: &OrderRequest) -> Result<Fill, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_errors_map_to_codes() {
        let auth: EngineError = BrokerError::AuthRejected {
            reason: "bad key".to_string(),
        }
        .into();
        assert_eq!(auth.code(), ErrorCode::AuthRejected);

        let rejected: EngineError = BrokerError::Rejected {
            reason: "market closed".to_string(),
        }
        .into();
        assert_eq!(rejected.code(), ErrorCode::OrderRejected);
        assert!(rejected.message().contains("market closed"));

        let down: EngineError = BrokerError::Unavailable {
            message: "timeout".to_string(),
        }
        .into();
        assert_eq!(down.code(), ErrorCode::BrokerUnavailable);
    }
}
