//! Supported broker table.

use serde::Serialize;

/// A broker the engine can link accounts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedBroker {
    /// Stable broker id used in routes and records.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// OAuth authorization endpoint.
    pub authorize_url: &'static str,
}

/// All brokers accepted by `connect`, `init_oauth` and order placement.
pub const SUPPORTED_BROKERS: &[SupportedBroker] = &[
    SupportedBroker {
        id: "alpaca",
        name: "Alpaca",
        authorize_url: "https://app.alpaca.markets/oauth/authorize",
    },
    SupportedBroker {
        id: "oanda",
        name: "OANDA",
        authorize_url: "https://www.oanda.com/oauth/authorize",
    },
    SupportedBroker {
        id: "zerodha",
        name: "Zerodha Kite",
        authorize_url: "https://kite.zerodha.com/connect/login",
    },
    SupportedBroker {
        id: "upstox",
        name: "Upstox",
        authorize_url: "https://api.upstox.com/v2/login/authorization/dialog",
    },
];

/// Look up a supported broker by id.
#[must_use]
pub fn find_broker(id: &str) -> Option<&'static SupportedBroker> {
    SUPPORTED_BROKERS.iter().find(|b| b.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_broker_found() {
        assert_eq!(find_broker("oanda").map(|b| b.name), Some("OANDA"));
    }

    #[test]
    fn unknown_broker_missing() {
        assert!(find_broker("robinhood").is_none());
    }

    #[test]
    fn ids_are_unique() {
        for (i, a) in SUPPORTED_BROKERS.iter().enumerate() {
            for b in &SUPPORTED_BROKERS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }
}
