//! Positions and weighted-average-cost bookkeeping.
//!
//! A position is keyed by (user, broker, symbol). Its quantity is the running
//! signed sum of fill deltas; flat positions keep their record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::{Fill, OrderSide};
use crate::domain::shared::{BrokerId, Symbol, UserId};
use crate::error::EngineError;

// =============================================================================
// Crossing Policy
// =============================================================================

/// How the average price is set when a fill flips the position's sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingPolicy {
    /// Close the old leg and open the new leg at the fill price.
    #[default]
    SplitAtZero,
    /// Apply the weighted-average formula across the flip.
    Blend,
}

impl CrossingPolicy {
    /// Configuration name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SplitAtZero => "split",
            Self::Blend => "blend",
        }
    }
}

impl fmt::Display for CrossingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrossingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "split" | "split_at_zero" => Ok(Self::SplitAtZero),
            "blend" => Ok(Self::Blend),
            other => Err(format!("unknown crossing policy '{other}'")),
        }
    }
}

// =============================================================================
// Position
// =============================================================================

/// Ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    /// Owning user.
    pub user_id: UserId,
    /// Broker.
    pub broker_id: BrokerId,
    /// Instrument.
    pub symbol: Symbol,
}

impl PositionKey {
    /// Create a key.
    #[must_use]
    pub const fn new(user_id: UserId, broker_id: BrokerId, symbol: Symbol) -> Self {
        Self {
            user_id,
            broker_id,
            symbol,
        }
    }
}

/// A (possibly flat) position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Owning user.
    pub user_id: UserId,
    /// Broker.
    pub broker_id: BrokerId,
    /// Instrument.
    pub symbol: Symbol,
    /// Signed quantity (positive = long, negative = short).
    pub quantity: Decimal,
    /// Weighted-average entry price.
    pub average_price: Decimal,
    /// Last mark price.
    pub current_price: Decimal,
    /// Unrealized P&L against `current_price`.
    pub pnl: Decimal,
    /// Unrealized P&L as a percent of cost.
    pub pnl_percent: Decimal,
    /// Product tag.
    pub product: Option<String>,
    /// Exchange tag.
    pub exchange: Option<String>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// A flat position with no history.
    #[must_use]
    pub fn flat(key: PositionKey, updated_at: DateTime<Utc>) -> Self {
        Self {
            user_id: key.user_id,
            broker_id: key.broker_id,
            symbol: key.symbol,
            quantity: Decimal::ZERO,
            average_price: Decimal::ZERO,
            current_price: Decimal::ZERO,
            pnl: Decimal::ZERO,
            pnl_percent: Decimal::ZERO,
            product: None,
            exchange: None,
            updated_at,
        }
    }

    /// Ledger key of this position.
    #[must_use]
    pub fn key(&self) -> PositionKey {
        PositionKey::new(
            self.user_id.clone(),
            self.broker_id.clone(),
            self.symbol.clone(),
        )
    }

    /// Whether the quantity is nonzero.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.quantity.is_zero()
    }

    /// Compute the position after a fill.
    ///
    /// Returns a new value; `self` is untouched so that a failed computation
    /// leaves the stored record as it was.
    ///
    /// # Errors
    ///
    /// Returns `INTERNAL_ERROR` if any intermediate value overflows.
    pub fn apply_fill(
        &self,
        side: OrderSide,
        fill: &Fill,
        policy: CrossingPolicy,
    ) -> Result<Self, EngineError> {
        let old_quantity = self.quantity;
        let delta = side.signed(fill.quantity);
        let new_quantity = checked(old_quantity.checked_add(delta), "quantity")?;

        let crosses_zero = !old_quantity.is_zero()
            && !new_quantity.is_zero()
            && old_quantity.is_sign_negative() != new_quantity.is_sign_negative();

        let average_price = if new_quantity.is_zero() {
            self.average_price
        } else if crosses_zero && policy == CrossingPolicy::SplitAtZero {
            fill.price
        } else {
            let cost = checked(self.average_price.checked_mul(old_quantity), "cost")?;
            let added = checked(fill.price.checked_mul(delta), "cost")?;
            let total = checked(cost.checked_add(added), "cost")?;
            checked(total.checked_div(new_quantity), "average price")?
        };

        let current_price = fill.price;
        let spread = checked(current_price.checked_sub(average_price), "pnl")?;
        let pnl = checked(spread.checked_mul(new_quantity), "pnl")?;
        let basis = checked(average_price.checked_mul(new_quantity.abs()), "pnl percent")?;
        let pnl_percent = if basis.is_zero() {
            Decimal::ZERO
        } else {
            let ratio = checked(pnl.checked_div(basis), "pnl percent")?;
            checked(ratio.checked_mul(Decimal::ONE_HUNDRED), "pnl percent")?
        };

        Ok(Self {
            user_id: self.user_id.clone(),
            broker_id: self.broker_id.clone(),
            symbol: self.symbol.clone(),
            quantity: new_quantity,
            average_price,
            current_price,
            pnl,
            pnl_percent,
            product: self.product.clone(),
            exchange: self.exchange.clone(),
            updated_at: fill.executed_at,
        })
    }
}

fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal, EngineError> {
    value.ok_or_else(|| {
        EngineError::internal(format!("arithmetic overflow computing {what}"))
            .with_context("operation", what)
    })
}
