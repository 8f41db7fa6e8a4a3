//! Order records.
//!
//! Orders are synthesized from a validated [`OrderRequest`] and the [`Fill`]
//! returned by the broker adapter. Once built they are never mutated.

mod draft;
mod types;

pub use draft::{OrderDraft, OrderRequest};
pub use types::{OrderSide, OrderStatus, OrderType};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{BrokerId, OrderId, Symbol, UserId};
use crate::error::EngineError;

/// Execution result returned by a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    /// Quantity transacted (unsigned).
    pub quantity: Decimal,
    /// Execution price.
    pub price: Decimal,
    /// Execution time.
    pub executed_at: DateTime<Utc>,
}

impl Fill {
    /// Create a fill executed now.
    #[must_use]
    pub fn now(quantity: Decimal, price: Decimal) -> Self {
        Self {
            quantity,
            price,
            executed_at: Utc::now(),
        }
    }
}

/// Immutable order record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Generated order id.
    pub order_id: OrderId,
    /// Engine-wide insertion sequence.
    #[serde(skip)]
    pub sequence: u64,
    /// Owning user.
    pub user_id: UserId,
    /// Broker the order was routed to.
    pub broker_id: BrokerId,
    /// Instrument.
    pub symbol: Symbol,
    /// Side.
    pub side: OrderSide,
    /// Type.
    #[serde(rename = "type")]
    pub order_type: OrderType,
    /// Requested quantity.
    pub quantity: Decimal,
    /// Requested price, if any.
    pub price: Option<Decimal>,
    /// Fill status.
    pub status: OrderStatus,
    /// Quantity actually filled.
    pub filled_quantity: Decimal,
    /// Average fill price.
    pub average_price: Decimal,
    /// Exchange tag.
    pub exchange: Option<String>,
    /// Product tag.
    pub product: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build the order record for a fill.
    ///
    /// # Errors
    ///
    /// Returns `INTERNAL_ERROR` if the fill is empty, priced at or below
    /// zero, or larger than the requested quantity.
    pub fn from_fill(request: OrderRequest, fill: &Fill, sequence: u64) -> Result<Self, EngineError> {
        if fill.quantity <= Decimal::ZERO || fill.price <= Decimal::ZERO {
            return Err(EngineError::internal("broker returned an empty or unpriced fill")
                .with_context("filled_quantity", fill.quantity.to_string())
                .with_context("fill_price", fill.price.to_string()));
        }
        if fill.quantity > request.quantity {
            return Err(EngineError::internal("broker filled more than requested")
                .with_context("requested", request.quantity.to_string())
                .with_context("filled", fill.quantity.to_string()));
        }

        let status = if fill.quantity == request.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };

        Ok(Self {
            order_id: OrderId::generate(),
            sequence,
            user_id: request.user_id,
            broker_id: request.broker_id,
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            status,
            filled_quantity: fill.quantity,
            average_price: fill.price,
            exchange: request.exchange,
            product: request.product,
            created_at: fill.executed_at,
            updated_at: fill.executed_at,
        })
    }

    /// Signed position delta produced by this order.
    #[must_use]
    pub fn signed_fill(&self) -> Decimal {
        self.side.signed(self.filled_quantity)
    }
}
