//! Synthetic Market Data
//!
//! Stateless pseudo-random ticks around a per-symbol reference price. Each
//! tick opens at the reference price and moves at most 1% from it.

use std::collections::HashMap;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;

use crate::application::ports::MarketDataSource;
use crate::domain::market::PriceTick;
use crate::domain::shared::Symbol;

/// Price for symbols missing from the reference table.
pub const DEFAULT_REFERENCE_PRICE: Decimal = Decimal::ONE_HUNDRED;

/// Largest move from the reference price, in basis points.
const MAX_MOVE_BPS: i64 = 100;

/// Extra width of the high/low band beyond open and price, in basis points.
const MAX_WICK_BPS: i64 = 20;

const PRICE_DP: u32 = 4;

const REFERENCE_PRICES: &[(&str, i64, u32)] = &[
    ("EURUSD", 11_000, 4),
    ("GBPUSD", 12_700, 4),
    ("USDJPY", 14_950, 2),
    ("AUDUSD", 6_600, 4),
    ("USDINR", 8_320, 2),
    ("AAPL", 19_000, 2),
    ("MSFT", 41_000, 2),
    ("GOOGL", 14_000, 2),
    ("TSLA", 25_000, 2),
    ("SPY", 51_000, 2),
    ("RELIANCE", 290_000, 2),
    ("TCS", 380_000, 2),
    ("INFY", 150_000, 2),
    ("NIFTY", 2_200_000, 2),
];

/// Generator of synthetic ticks.
#[derive(Debug, Clone)]
pub struct SyntheticMarketData {
    references: HashMap<Symbol, Decimal>,
}

impl Default for SyntheticMarketData {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticMarketData {
    /// Create a generator with the built-in reference table.
    #[must_use]
    pub fn new() -> Self {
        let references = REFERENCE_PRICES
            .iter()
            .map(|&(symbol, mantissa, scale)| (Symbol::new(symbol), Decimal::new(mantissa, scale)))
            .collect();
        Self { references }
    }

    /// Override or add a reference price.
    #[must_use]
    pub fn with_reference(mut self, symbol: &str, price: Decimal) -> Self {
        self.references.insert(Symbol::normalized(symbol), price);
        self
    }
}

fn bps(value: i64) -> Decimal {
    Decimal::new(value, 4)
}

impl MarketDataSource for SyntheticMarketData {
    fn tick(&self, symbol: &Symbol) -> PriceTick {
        let mut rng = rand::rng();
        let open = self.reference_price(symbol).round_dp(PRICE_DP);

        let move_bps = rng.random_range(-MAX_MOVE_BPS..=MAX_MOVE_BPS);
        let price = (open * (Decimal::ONE + bps(move_bps))).round_dp(PRICE_DP);

        let high_wick = bps(rng.random_range(0..=MAX_WICK_BPS));
        let low_wick = bps(rng.random_range(0..=MAX_WICK_BPS));
        let high = (open.max(price) * (Decimal::ONE + high_wick)).round_dp(PRICE_DP);
        let low = (open.min(price) * (Decimal::ONE - low_wick)).round_dp(PRICE_DP);

        let change = price - open;
        let change_percent = if open.is_zero() {
            Decimal::ZERO
        } else {
            (change / open * Decimal::ONE_HUNDRED).round_dp(2)
        };

        PriceTick {
            symbol: symbol.clone(),
            price,
            change,
            change_percent,
            volume: rng.random_range(1_000..=500_000),
            high,
            low,
            open,
            timestamp: Utc::now(),
        }
    }

    fn reference_price(&self, symbol: &Symbol) -> Decimal {
        self.references
            .get(symbol)
            .copied()
            .unwrap_or(DEFAULT_REFERENCE_PRICE)
    }
}
