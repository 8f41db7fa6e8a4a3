//! Engine settings loaded from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use chrono::TimeDelta;

use crate::application::services::ConnectionRegistryConfig;
use crate::domain::position::CrossingPolicy;
use crate::error::EngineError;
use crate::infrastructure::stream::StreamConfig;

/// Secret used to derive the credential vault key.
///
/// The value is redacted in `Debug` output.
#[derive(Clone)]
pub struct VaultSecret(String);

impl VaultSecret {
    /// Wrap a secret.
    #[must_use]
    pub const fn new(secret: String) -> Self {
        Self(secret)
    }

    /// The raw secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for VaultSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultSecret([REDACTED])")
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Bind address.
    pub bind_address: IpAddr,
    /// HTTP and WebSocket port.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 8080,
        }
    }
}

impl ServerSettings {
    /// Socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.http_port)
    }
}

/// Stream hub settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Push cadence.
    pub tick_interval: Duration,
    /// Per-subscriber queue bound.
    pub client_buffer: usize,
    /// Bound on a single socket write.
    pub write_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        let defaults = StreamConfig::default();
        Self {
            tick_interval: defaults.tick_interval,
            client_buffer: defaults.client_buffer,
            write_timeout: defaults.write_timeout,
        }
    }
}

impl From<StreamSettings> for StreamConfig {
    fn from(settings: StreamSettings) -> Self {
        Self {
            tick_interval: settings.tick_interval,
            client_buffer: settings.client_buffer,
            write_timeout: settings.write_timeout,
        }
    }
}

/// Position ledger settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Average-price rule for sign-flipping fills.
    pub crossing_policy: CrossingPolicy,
}

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Credential vault secret.
    pub vault_secret: VaultSecret,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Stream hub settings.
    pub stream: StreamSettings,
    /// Connection registry settings.
    pub connections: ConnectionRegistryConfig,
    /// Position ledger settings.
    pub ledger: LedgerSettings,
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `VAULT_SECRET_KEY` is missing or empty, or if a
    /// set variable has a value the engine cannot run with.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`EngineConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vault_secret = lookup("VAULT_SECRET_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("VAULT_SECRET_KEY".to_string()))?;
        if vault_secret.is_empty() {
            return Err(ConfigError::EmptyValue("VAULT_SECRET_KEY".to_string()));
        }

        let server_defaults = ServerSettings::default();
        let bind_address = match lookup("ENGINE_BIND_ADDRESS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("ENGINE_BIND_ADDRESS", &raw))?,
            None => server_defaults.bind_address,
        };
        let server = ServerSettings {
            bind_address,
            http_port: parse_or(&lookup, "ENGINE_HTTP_PORT", server_defaults.http_port),
        };

        let stream_defaults = StreamSettings::default();
        let stream = StreamSettings {
            tick_interval: parse_duration_millis(
                &lookup,
                "STREAM_TICK_INTERVAL_MS",
                stream_defaults.tick_interval,
            ),
            client_buffer: parse_or(&lookup, "STREAM_CLIENT_BUFFER", stream_defaults.client_buffer),
            write_timeout: parse_duration_millis(
                &lookup,
                "STREAM_WRITE_TIMEOUT_MS",
                stream_defaults.write_timeout,
            ),
        };
        if stream.tick_interval.is_zero() {
            return Err(ConfigError::invalid("STREAM_TICK_INTERVAL_MS", "0"));
        }
        if stream.client_buffer == 0 {
            return Err(ConfigError::invalid("STREAM_CLIENT_BUFFER", "0"));
        }

        let connection_defaults = ConnectionRegistryConfig::default();
        let token_ttl = lookup("CONNECTION_TOKEN_TTL_HOURS")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(TimeDelta::try_hours)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .unwrap_or(connection_defaults.token_ttl);
        let connections = ConnectionRegistryConfig {
            token_ttl,
            oauth_client_id: lookup("OAUTH_CLIENT_ID")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(connection_defaults.oauth_client_id),
        };

        let crossing_policy = match lookup("LEDGER_CROSSING_POLICY") {
            Some(raw) => raw
                .parse::<CrossingPolicy>()
                .map_err(|_| ConfigError::invalid("LEDGER_CROSSING_POLICY", &raw))?,
            None => CrossingPolicy::default(),
        };

        Ok(Self {
            vault_secret: VaultSecret::new(vault_secret),
            server,
            stream,
            connections,
            ledger: LedgerSettings { crossing_policy },
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        Self::internal(err.to_string())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
