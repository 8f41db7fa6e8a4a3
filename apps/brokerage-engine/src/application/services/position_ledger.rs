//! Position Ledger
//!
//! Positions keyed by `(user, broker, symbol)`. Writes go through the order
//! engine only; each write is a single read-modify-write under the key's
//! shard lock.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::domain::order::{Fill, OrderSide};
use crate::domain::position::{CrossingPolicy, Position, PositionKey};
use crate::domain::shared::{BrokerId, Symbol, UserId};
use crate::error::EngineError;

/// Tags copied onto the position when an order carries them.
#[derive(Debug, Clone, Default)]
pub(crate) struct PositionTags {
    pub product: Option<String>,
    pub exchange: Option<String>,
}

/// Concurrent position store.
#[derive(Debug, Default)]
pub struct PositionLedger {
    positions: DashMap<PositionKey, Position>,
}

impl PositionLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fill to the position at `key`.
    ///
    /// `on_commit` runs after the new position is computed and before it is
    /// stored, while the key's lock is held. If the computation fails neither
    /// `on_commit` nor the store happens.
    pub(crate) fn apply<F>(
        &self,
        key: PositionKey,
        side: OrderSide,
        fill: &Fill,
        policy: CrossingPolicy,
        tags: PositionTags,
        on_commit: F,
    ) -> Result<Position, EngineError>
    where
        F: FnOnce(),
    {
        let compute = |current: &Position| -> Result<Position, EngineError> {
            let mut updated = current.apply_fill(side, fill, policy)?;
            if tags.product.is_some() {
                updated.product.clone_from(&tags.product);
            }
            if tags.exchange.is_some() {
                updated.exchange.clone_from(&tags.exchange);
            }
            Ok(updated)
        };

        match self.positions.entry(key) {
            Entry::Occupied(mut occupied) => {
                let updated = compute(occupied.get())?;
                on_commit();
                occupied.insert(updated.clone());
                Ok(updated)
            }
            Entry::Vacant(vacant) => {
                let flat = Position::flat(vacant.key().clone(), fill.executed_at);
                let updated = compute(&flat)?;
                on_commit();
                vacant.insert(updated.clone());
                Ok(updated)
            }
        }
    }

    /// Position for a key, including flat records.
    #[must_use]
    pub fn get(&self, user_id: &UserId, broker_id: &BrokerId, symbol: &Symbol) -> Option<Position> {
        let key = PositionKey::new(user_id.clone(), broker_id.clone(), symbol.clone());
        self.positions.get(&key).map(|entry| entry.value().clone())
    }

    /// Nonzero positions for a user at a broker, sorted by symbol.
    #[must_use]
    pub fn open_positions(&self, user_id: &UserId, broker_id: &BrokerId) -> Vec<Position> {
        let mut open: Vec<Position> = self
            .positions
            .iter()
            .filter(|entry| {
                let key = entry.key();
                &key.user_id == user_id && &key.broker_id == broker_id && entry.value().is_open()
            })
            .map(|entry| entry.value().clone())
            .collect();
        open.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        open
    }

    /// Number of records, flat ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the ledger holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
