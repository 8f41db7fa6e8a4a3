//! Order Engine
//!
//! Validates order drafts, obtains a fill from the broker adapter, records
//! the immutable order and updates the position it touches. The engine is the
//! only writer of the position ledger.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::position_ledger::{PositionLedger, PositionTags};
use crate::application::ports::BrokerAdapter;
use crate::domain::connection::find_broker;
use crate::domain::order::{Order, OrderDraft};
use crate::domain::position::{CrossingPolicy, Position, PositionKey};
use crate::domain::shared::{BrokerId, OrderId, Symbol, UserId};
use crate::error::EngineError;
use crate::infrastructure::metrics::{record_order_failure, record_order_placed};

type BookKey = (UserId, BrokerId);

/// Order placement and order/position queries.
pub struct OrderEngine {
    adapter: Arc<dyn BrokerAdapter>,
    ledger: Arc<PositionLedger>,
    orders: DashMap<BookKey, Vec<Order>>,
    order_index: DashMap<OrderId, BookKey>,
    sequence: AtomicU64,
    policy: CrossingPolicy,
}

impl std::fmt::Debug for OrderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderEngine")
            .field("adapter", &self.adapter.name())
            .field("orders", &self.order_index.len())
            .field("positions", &self.ledger.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl OrderEngine {
    /// Create an engine over an adapter and a ledger.
    #[must_use]
    pub fn new(
        adapter: Arc<dyn BrokerAdapter>,
        ledger: Arc<PositionLedger>,
        policy: CrossingPolicy,
    ) -> Self {
        Self {
            adapter,
            ledger,
            orders: DashMap::new(),
            order_index: DashMap::new(),
            sequence: AtomicU64::new(0),
            policy,
        }
    }

    /// Crossing policy in effect.
    #[must_use]
    pub const fn policy(&self) -> CrossingPolicy {
        self.policy
    }

    /// Shared position ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Arc<PositionLedger> {
        &self.ledger
    }

    /// Validate, fill and record an order, then update its position.
    ///
    /// # Errors
    ///
    /// - `INVALID_ORDER` for missing or invalid fields
    /// - `UNKNOWN_BROKER` for an unsupported broker
    /// - `ORDER_REJECTED` / `BROKER_UNAVAILABLE` from the adapter
    /// - `INTERNAL_ERROR` for an inconsistent fill or arithmetic overflow
    ///
    /// On error nothing is recorded and no position changes.
    pub async fn place_order(&self, draft: OrderDraft) -> Result<Order, EngineError> {
        match self.try_place(draft).await {
            Ok((order, position)) => {
                record_order_placed(order.side);
                tracing::info!(
                    order_id = %order.order_id,
                    user_id = %order.user_id,
                    broker_id = %order.broker_id,
                    symbol = %order.symbol,
                    side = %order.side,
                    filled = %order.filled_quantity,
                    price = %order.average_price,
                    position = %position.quantity,
                    "Order filled"
                );
                Ok(order)
            }
            Err(e) => {
                record_order_failure(e.code());
                tracing::warn!(code = %e.code(), error = %e.message(), "Order placement failed");
                Err(e)
            }
        }
    }

    async fn try_place(&self, draft: OrderDraft) -> Result<(Order, Position), EngineError> {
        let request = draft.validate()?;
        if find_broker(request.broker_id.as_str()).is_none() {
            return Err(EngineError::unknown_broker(request.broker_id.as_str()));
        }

        let fill = self.adapter.execute(&request).await?;

        let position_key = PositionKey::new(
            request.user_id.clone(),
            request.broker_id.clone(),
            request.symbol.clone(),
        );
        let tags = PositionTags {
            product: request.product.clone(),
            exchange: request.exchange.clone(),
        };
        let side = request.side;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let order = Order::from_fill(request, &fill, sequence)?;

        let book_key: BookKey = (order.user_id.clone(), order.broker_id.clone());
        let position = self
            .ledger
            .apply(position_key, side, &fill, self.policy, tags, || {
                self.order_index
                    .insert(order.order_id.clone(), book_key.clone());
                self.orders.entry(book_key).or_default().push(order.clone());
            })?;

        Ok((order, position))
    }

    /// Orders for a user at a broker, newest first.
    ///
    /// Orders created at the same instant keep insertion order.
    #[must_use]
    pub fn get_orders(&self, broker_id: &BrokerId, user_id: &UserId) -> Vec<Order> {
        let key = (user_id.clone(), broker_id.clone());
        let mut orders = self
            .orders
            .get(&key)
            .map(|book| book.value().clone())
            .unwrap_or_default();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        orders
    }

    /// Single order by id.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if no such order exists.
    pub fn get_order(&self, order_id: &OrderId) -> Result<Order, EngineError> {
        let not_found = || EngineError::not_found("order", order_id.as_str());
        let key = self
            .order_index
            .get(order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(not_found)?;
        self.orders
            .get(&key)
            .and_then(|book| book.iter().find(|o| &o.order_id == order_id).cloned())
            .ok_or_else(not_found)
    }

    /// Open positions for a user at a broker, sorted by symbol.
    #[must_use]
    pub fn get_positions(&self, broker_id: &BrokerId, user_id: &UserId) -> Vec<Position> {
        self.ledger.open_positions(user_id, broker_id)
    }

    /// Position for a key, flat records included.
    #[must_use]
    pub fn position(&self, user_id: &UserId, broker_id: &BrokerId, symbol: &Symbol) -> Option<Position> {
        self.ledger.get(user_id, broker_id, symbol)
    }

    /// Total orders recorded.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.order_index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{BrokerError, MockBrokerAdapter};
    use crate::domain::order::{Fill, OrderStatus};
    use crate::error::ErrorCode;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn engine_with(adapter: MockBrokerAdapter) -> OrderEngine {
        OrderEngine::new(
            Arc::new(adapter),
            Arc::new(PositionLedger::new()),
            CrossingPolicy::SplitAtZero,
        )
    }

    fn filling_adapter(price: Decimal) -> MockBrokerAdapter {
        let mut adapter = MockBrokerAdapter::new();
        adapter
            .expect_execute()
            .returning(move |req| Ok(Fill::now(req.quantity, req.price.unwrap_or(price))));
        adapter
    }

    fn draft(side: &str, quantity: Decimal) -> OrderDraft {
        OrderDraft {
            user_id: Some("u-1".to_string()),
            broker_id: Some("oanda".to_string()),
            symbol: Some("EURUSD".to_string()),
            side: Some(side.to_string()),
            quantity: Some(quantity),
            ..OrderDraft::default()
        }
    }

    #[tokio::test]
    async fn places_order_and_updates_position() {
        let engine = engine_with(filling_adapter(dec!(1.1)));
        let order = engine.place_order(draft("buy", dec!(100))).await.unwrap();

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.average_price, dec!(1.1));
        assert_eq!(engine.get_order(&order.order_id).unwrap(), order);

        let positions = engine.get_positions(&BrokerId::new("oanda"), &UserId::new("u-1"));
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, dec!(100));
        assert_eq!(positions[0].current_price, dec!(1.1));
    }

    #[tokio::test]
    async fn invalid_order_never_reaches_adapter() {
        let mut adapter = MockBrokerAdapter::new();
        adapter.expect_execute().never();
        let engine = engine_with(adapter);

        let err = engine.place_order(draft("buy", dec!(0))).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOrder);
        assert_eq!(engine.order_count(), 0);
        assert!(engine.ledger().is_empty());
    }

    #[tokio::test]
    async fn unknown_broker_rejected() {
        let mut adapter = MockBrokerAdapter::new();
        adapter.expect_execute().never();
        let engine = engine_with(adapter);

        let mut d = draft("buy", dec!(1));
        d.broker_id = Some("robinhood".to_string());
        let err = engine.place_order(d).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownBroker);
    }

    #[tokio::test]
    async fn broker_rejection_changes_nothing() {
        let mut adapter = MockBrokerAdapter::new();
        adapter.expect_execute().returning(|_| {
            Err(BrokerError::Rejected {
                reason: "insufficient margin".to_string(),
            })
        });
        let engine = engine_with(adapter);

        let err = engine.place_order(draft("sell", dec!(5))).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrderRejected);
        assert_eq!(engine.order_count(), 0);
        assert!(engine.ledger().is_empty());
    }

    #[tokio::test]
    async fn overfill_is_internal_error() {
        let mut adapter = MockBrokerAdapter::new();
        adapter
            .expect_execute()
            .returning(|req| Ok(Fill::now(req.quantity + Decimal::ONE, dec!(1))));
        let engine = engine_with(adapter);

        let err = engine.place_order(draft("buy", dec!(5))).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(engine.ledger().is_empty());
    }

    #[tokio::test]
    async fn partial_fill_moves_position_by_filled_quantity() {
        let mut adapter = MockBrokerAdapter::new();
        adapter
            .expect_execute()
            .returning(|req| Ok(Fill::now(req.quantity / Decimal::TWO, dec!(2))));
        let engine = engine_with(adapter);

        let order = engine.place_order(draft("buy", dec!(10))).await.unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        let position = engine
            .position(&UserId::new("u-1"), &BrokerId::new("oanda"), &Symbol::new("EURUSD"))
            .unwrap();
        assert_eq!(position.quantity, dec!(5));
    }

    #[tokio::test]
    async fn missing_order_not_found() {
        let engine = engine_with(MockBrokerAdapter::new());
        let err = engine.get_order(&OrderId::new("nope")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn orders_scoped_by_user_and_broker() {
        let engine = engine_with(filling_adapter(dec!(1)));
        engine.place_order(draft("buy", dec!(1))).await.unwrap();
        let mut other = draft("buy", dec!(1));
        other.user_id = Some("u-2".to_string());
        engine.place_order(other).await.unwrap();

        assert_eq!(engine.get_orders(&BrokerId::new("oanda"), &UserId::new("u-1")).len(), 1);
        assert!(engine.get_orders(&BrokerId::new("alpaca"), &UserId::new("u-1")).is_empty());
    }

    #[tokio::test]
    async fn same_instant_orders_keep_placement_order() {
        let instant = chrono::DateTime::from_timestamp(1_767_623_400, 0).unwrap();
        let later = instant + chrono::Duration::seconds(1);

        let mut adapter = MockBrokerAdapter::new();
        adapter.expect_execute().returning(move |req| {
            let executed_at = if req.symbol.as_str() == "AAPL" { later } else { instant };
            Ok(Fill {
                quantity: req.quantity,
                price: dec!(1),
                executed_at,
            })
        });
        let engine = engine_with(adapter);

        for quantity in [dec!(1), dec!(2), dec!(3)] {
            engine.place_order(draft("buy", quantity)).await.unwrap();
        }
        let mut late = draft("buy", dec!(4));
        late.symbol = Some("AAPL".to_string());
        engine.place_order(late).await.unwrap();

        let orders = engine.get_orders(&BrokerId::new("oanda"), &UserId::new("u-1"));
        let quantities: Vec<Decimal> = orders.iter().map(|o| o.quantity).collect();
        assert_eq!(quantities, vec![dec!(4), dec!(1), dec!(2), dec!(3)]);
        assert!(orders[1..].iter().all(|o| o.created_at == instant));
    }
}
