//! Market Data Port (Driven Port)

use rust_decimal::Decimal;

use crate::domain::market::PriceTick;
use crate::domain::shared::Symbol;

/// Source of price ticks and reference prices.
pub trait MarketDataSource: Send + Sync {
    /// Produce the next tick for a symbol.
    fn tick(&self, symbol: &Symbol) -> PriceTick;

    /// Base price used when a market order carries no price.
    fn reference_price(&self, symbol: &Symbol) -> Decimal;
}
