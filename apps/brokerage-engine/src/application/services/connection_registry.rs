//! Connection Registry
//!
//! Owns every `BrokerConnection`. Records are keyed by `(user, broker)`,
//! overwritten on reconnect and never removed.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::application::ports::BrokerAdapter;
use crate::domain::connection::{
    BrokerConnection, BrokerCredentials, ConnectionStatus, OAuthInit, SUPPORTED_BROKERS,
    SupportedBroker, find_broker,
};
use crate::domain::shared::{BrokerId, UserId};
use crate::error::EngineError;
use crate::infrastructure::metrics::{ConnectionEvent, record_connection_event};
use crate::infrastructure::vault::CredentialVault;

const OAUTH_STATE_BYTES: usize = 32;

/// Registry settings.
#[derive(Debug, Clone)]
pub struct ConnectionRegistryConfig {
    /// Lifetime of session tokens issued on connect.
    pub token_ttl: TimeDelta,
    /// Client id placed on OAuth authorization URLs.
    pub oauth_client_id: String,
}

impl Default for ConnectionRegistryConfig {
    fn default() -> Self {
        Self {
            token_ttl: TimeDelta::hours(24),
            oauth_client_id: "brokerage-engine".to_string(),
        }
    }
}

/// Per-user, per-broker connection store.
pub struct ConnectionRegistry {
    connections: DashMap<(UserId, BrokerId), BrokerConnection>,
    vault: CredentialVault,
    adapter: Arc<dyn BrokerAdapter>,
    config: ConnectionRegistryConfig,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.connections.len())
            .field("adapter", &self.adapter.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(
        vault: CredentialVault,
        adapter: Arc<dyn BrokerAdapter>,
        config: ConnectionRegistryConfig,
    ) -> Self {
        Self {
            connections: DashMap::new(),
            vault,
            adapter,
            config,
        }
    }

    /// Brokers accepted by this registry.
    #[must_use]
    pub const fn supported_brokers(&self) -> &'static [SupportedBroker] {
        SUPPORTED_BROKERS
    }

    /// All connection records for a user, sorted by broker id.
    #[must_use]
    pub fn list_connections(&self, user_id: &UserId) -> Vec<BrokerConnection> {
        let mut list: Vec<BrokerConnection> = self
            .connections
            .iter()
            .filter(|entry| &entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| a.broker_id.cmp(&b.broker_id));
        list
    }

    /// Start an OAuth flow for a broker.
    ///
    /// # Errors
    ///
    /// Returns `UNKNOWN_BROKER` if the broker is not supported, or
    /// `INTERNAL_ERROR` if the OS random source fails.
    pub fn init_oauth(&self, broker_id: &BrokerId) -> Result<OAuthInit, EngineError> {
        let broker = supported(broker_id)?;

        let mut state_bytes = [0u8; OAUTH_STATE_BYTES];
        OsRng.try_fill_bytes(&mut state_bytes).map_err(|e| {
            EngineError::internal(format!("OS random source unavailable: {e}"))
        })?;
        let state = hex::encode(state_bytes);

        let auth_url = format!(
            "{}?response_type=code&client_id={}&state={}",
            broker.authorize_url, self.config.oauth_client_id, state
        );

        record_connection_event(ConnectionEvent::OAuthInit);
        tracing::debug!(broker_id = %broker_id, "OAuth flow started");
        Ok(OAuthInit { auth_url, state })
    }

    /// Link a user to a broker, replacing any existing record.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` for a blank user id, `UNKNOWN_BROKER` for an
    /// unsupported broker, `AUTH_REJECTED`/`BROKER_UNAVAILABLE` from the
    /// handshake, or `INTERNAL_ERROR` if the credentials cannot be sealed.
    pub async fn connect(
        &self,
        user_id: UserId,
        broker_id: &BrokerId,
        credentials: BrokerCredentials,
    ) -> Result<BrokerConnection, EngineError> {
        if user_id.is_blank() {
            return Err(EngineError::invalid_request("userId is required"));
        }
        let broker = supported(broker_id)?;

        let tokens = self.adapter.handshake(broker, &credentials).await?;
        let sealed = self.vault.seal(&credentials)?;

        let now = Utc::now();
        let connection = BrokerConnection {
            user_id: user_id.clone(),
            broker_id: broker_id.clone(),
            status: ConnectionStatus::Connected,
            credentials: sealed,
            tokens,
            token_expires_at: now + self.config.token_ttl,
            last_sync_at: None,
            active: true,
            connected_at: now,
        };

        let replaced = self
            .connections
            .insert((user_id, broker_id.clone()), connection.clone())
            .is_some();

        record_connection_event(ConnectionEvent::Connect);
        tracing::info!(
            user_id = %connection.user_id,
            broker_id = %broker_id,
            adapter = self.adapter.name(),
            replaced,
            "Broker connected"
        );
        Ok(connection)
    }

    /// Mark a connection disconnected. No-op if it does not exist.
    pub fn disconnect(&self, user_id: &UserId, broker_id: &BrokerId) {
        let key = (user_id.clone(), broker_id.clone());
        if let Some(mut connection) = self.connections.get_mut(&key) {
            connection.status = ConnectionStatus::Disconnected;
            connection.active = false;
            record_connection_event(ConnectionEvent::Disconnect);
            tracing::info!(user_id = %user_id, broker_id = %broker_id, "Broker disconnected");
        }
    }

    /// Stamp the last sync time. Returns `None` if the connection does not
    /// exist.
    pub fn sync(&self, user_id: &UserId, broker_id: &BrokerId) -> Option<DateTime<Utc>> {
        let key = (user_id.clone(), broker_id.clone());
        let mut connection = self.connections.get_mut(&key)?;
        let now = Utc::now();
        connection.last_sync_at = Some(now);
        record_connection_event(ConnectionEvent::Sync);
        Some(now)
    }

    /// Fetch one connection record.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the connection does not exist.
    pub fn get_connection(
        &self,
        user_id: &UserId,
        broker_id: &BrokerId,
    ) -> Result<BrokerConnection, EngineError> {
        self.connections
            .get(&(user_id.clone(), broker_id.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::not_found("connection", format!("{user_id}/{broker_id}")))
    }

    /// Decrypt the stored credentials for a connection.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the connection does not exist or
    /// `DECRYPTION_FAILED` if the stored blob cannot be opened.
    pub fn credentials(
        &self,
        user_id: &UserId,
        broker_id: &BrokerId,
    ) -> Result<BrokerCredentials, EngineError> {
        let connection = self.get_connection(user_id, broker_id)?;
        Ok(self.vault.unseal(&connection.credentials)?)
    }

    /// Number of stored records, connected or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn supported(broker_id: &BrokerId) -> Result<&'static SupportedBroker, EngineError> {
    find_broker(broker_id.as_str()).ok_or_else(|| EngineError::unknown_broker(broker_id.as_str()))
}
