//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up user, broker, order and stream client ids.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a new unique identifier using UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Check whether the identifier is blank.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(UserId, "Identifier of the end user owning connections and orders.");
define_id!(BrokerId, "Identifier of a supported broker (e.g. `oanda`).");
define_id!(OrderId, "Unique identifier for an order.");
define_id!(ClientId, "Unique identifier for a streaming subscription.");
define_id!(Symbol, "Tradeable instrument symbol (e.g. `EURUSD`, `AAPL`).");

impl BrokerId {
    /// Trim and lower-case a raw broker id.
    #[must_use]
    pub fn normalized(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }
}

impl Symbol {
    /// Trim and upper-case a raw symbol.
    #[must_use]
    pub fn normalized(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_generate_is_unique() {
        assert_ne!(OrderId::generate(), OrderId::generate());
    }

    #[test]
    fn symbol_normalization() {
        assert_eq!(Symbol::normalized("  eurusd ").as_str(), "EURUSD");
    }

    #[test]
    fn broker_id_normalization() {
        assert_eq!(BrokerId::normalized(" OANDA").as_str(), "oanda");
    }

    #[test]
    fn blank_detection() {
        assert!(UserId::new("   ").is_blank());
        assert!(!UserId::new("u-1").is_blank());
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&UserId::new("u-1")).unwrap();
        assert_eq!(json, "\"u-1\"");
    }
}
