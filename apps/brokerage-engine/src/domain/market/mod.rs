//! Price ticks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::Symbol;

/// One synthetic or relayed quote for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTick {
    /// Instrument.
    pub symbol: Symbol,
    /// Last price.
    pub price: Decimal,
    /// `price - open`.
    pub change: Decimal,
    /// Change as a percent of `open`.
    pub change_percent: Decimal,
    /// Traded volume.
    pub volume: u64,
    /// Session high, at least `max(open, price)`.
    pub high: Decimal,
    /// Session low, at most `min(open, price)`.
    pub low: Decimal,
    /// Session open.
    pub open: Decimal,
    /// Quote time.
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    /// Whether the high/low band contains both open and price.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.high >= self.open.max(self.price) && self.low <= self.open.min(self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn band_consistency() {
        let mut tick = PriceTick {
            symbol: Symbol::new("AAPL"),
            price: dec!(101),
            change: dec!(1),
            change_percent: dec!(1),
            volume: 10,
            high: dec!(102),
            low: dec!(99),
            open: dec!(100),
            timestamp: Utc::now(),
        };
        assert!(tick.is_consistent());
        tick.high = dec!(100.5);
        assert!(!tick.is_consistent());
    }

    #[test]
    fn serializes_camel_case() {
        let tick = PriceTick {
            symbol: Symbol::new("AAPL"),
            price: dec!(1),
            change: dec!(0),
            change_percent: dec!(0),
            volume: 0,
            high: dec!(1),
            low: dec!(1),
            open: dec!(1),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&tick).unwrap();
        assert!(json.get("changePercent").is_some());
        assert_eq!(json["symbol"], "AAPL");
    }
}
