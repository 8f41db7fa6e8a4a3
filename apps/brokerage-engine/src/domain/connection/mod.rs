//! Broker Connections
//!
//! A connection links one user to one broker. Identity is the
//! `(user_id, broker_id)` pair; reconnecting overwrites the record and
//! disconnecting only flips its status, so records are never deleted.

mod brokers;
mod credentials;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use brokers::{SUPPORTED_BROKERS, SupportedBroker, find_broker};
pub use credentials::{BrokerCredentials, SealedCredentials, SessionTokens};

use super::shared::{BrokerId, UserId};

/// Connection lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Handshake completed, tokens valid until expiry.
    Connected,
    /// Disconnected by the user.
    Disconnected,
}

impl ConnectionStatus {
    /// Get the status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Authoritative connection record owned by the connection registry.
#[derive(Debug, Clone)]
pub struct BrokerConnection {
    /// Owning user.
    pub user_id: UserId,
    /// Broker.
    pub broker_id: BrokerId,
    /// Lifecycle status.
    pub status: ConnectionStatus,
    /// Credentials sealed by the credential vault.
    pub credentials: SealedCredentials,
    /// Session tokens from the broker handshake.
    pub tokens: SessionTokens,
    /// Token expiry.
    pub token_expires_at: DateTime<Utc>,
    /// Last account sync, if any.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Whether the connection is usable.
    pub active: bool,
    /// When the current record was created (last connect).
    pub connected_at: DateTime<Utc>,
}

impl BrokerConnection {
    /// Whether the access token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.token_expires_at
    }

    /// Public view without credentials or tokens.
    #[must_use]
    pub fn view(&self) -> ConnectionView {
        ConnectionView {
            user_id: self.user_id.clone(),
            broker_id: self.broker_id.clone(),
            status: self.status,
            active: self.active,
            token_expires_at: self.token_expires_at,
            last_sync_at: self.last_sync_at,
            connected_at: self.connected_at,
        }
    }
}

/// Connection as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionView {
    /// Owning user.
    pub user_id: UserId,
    /// Broker.
    pub broker_id: BrokerId,
    /// Lifecycle status.
    pub status: ConnectionStatus,
    /// Whether the connection is usable.
    pub active: bool,
    /// Token expiry.
    pub token_expires_at: DateTime<Utc>,
    /// Last account sync.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// When the connection was (re)established.
    pub connected_at: DateTime<Utc>,
}

/// Result of starting an OAuth flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthInit {
    /// URL the user is redirected to.
    pub auth_url: String,
    /// CSRF state token to verify on callback.
    pub state: String,
}
