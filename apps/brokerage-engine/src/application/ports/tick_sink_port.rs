//! Tick Sink Port (Driven Port)
//!
//! The non-owning handle the stream hub pushes ticks into. Delivery never
//! blocks: a full sink rejects the tick and the hub counts it as dropped.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::market::PriceTick;

/// Why a tick was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The subscriber's queue is full.
    #[error("subscriber queue full")]
    Backpressure,

    /// The transport is gone.
    #[error("transport closed")]
    Closed,
}

/// Destination for one subscriber's ticks.
pub trait TickSink: Send + Sync + 'static {
    /// Whether the transport behind the sink is still open.
    fn is_live(&self) -> bool;

    /// Enqueue a tick without waiting.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Backpressure`] when the queue is full,
    /// [`DeliveryError::Closed`] when the receiver is gone.
    fn try_deliver(&self, tick: PriceTick) -> Result<(), DeliveryError>;
}

impl TickSink for mpsc::Sender<PriceTick> {
    fn is_live(&self) -> bool {
        !self.is_closed()
    }

    fn try_deliver(&self, tick: PriceTick) -> Result<(), DeliveryError> {
        self.try_send(tick).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Backpressure,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::Symbol;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn tick() -> PriceTick {
        PriceTick {
            symbol: Symbol::new("AAPL"),
            price: Decimal::ONE,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            volume: 1,
            high: Decimal::ONE,
            low: Decimal::ONE,
            open: Decimal::ONE,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn full_channel_reports_backpressure() {
        let (tx, _rx) = mpsc::channel(1);
        assert!(tx.try_deliver(tick()).is_ok());
        assert_eq!(tx.try_deliver(tick()), Err(DeliveryError::Backpressure));
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (tx, rx) = mpsc::channel::<PriceTick>(1);
        drop(rx);
        assert!(!tx.is_live());
        assert_eq!(tx.try_deliver(tick()), Err(DeliveryError::Closed));
    }
}
