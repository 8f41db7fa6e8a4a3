//! Simulated Broker
//!
//! Default [`BrokerAdapter`]: every handshake succeeds with random tokens and
//! every order fills in full, at the requested price or else at the market
//! data reference price.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use crate::application::ports::{BrokerAdapter, BrokerError, MarketDataSource};
use crate::domain::connection::{BrokerCredentials, SessionTokens, SupportedBroker};
use crate::domain::order::{Fill, OrderRequest};

const TOKEN_BYTES: usize = 32;

/// Broker adapter that never touches the network.
#[derive(Clone)]
pub struct SimulatedBroker {
    market_data: Arc<dyn MarketDataSource>,
}

impl std::fmt::Debug for SimulatedBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBroker").finish_non_exhaustive()
    }
}

impl SimulatedBroker {
    /// Create a simulated broker pricing fills from `market_data`.
    #[must_use]
    pub fn new(market_data: Arc<dyn MarketDataSource>) -> Self {
        Self { market_data }
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl BrokerAdapter for SimulatedBroker {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn handshake(
        &self,
        broker: &SupportedBroker,
        _credentials: &BrokerCredentials,
    ) -> Result<SessionTokens, BrokerError> {
        tracing::debug!(broker = broker.id, "Simulated handshake");
        Ok(SessionTokens {
            access_token: random_token(),
            refresh_token: random_token(),
        })
    }

    async fn execute(&self, request: &OrderRequest) -> Result<Fill, BrokerError> {
        let price = request
            .price
            .unwrap_or_else(|| self.market_data.reference_price(&request.symbol));
        Ok(Fill::now(request.quantity, price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connection::find_broker;
    use crate::domain::order::{OrderSide, OrderType};
    use crate::domain::shared::{BrokerId, Symbol, UserId};
    use crate::infrastructure::market_data::SyntheticMarketData;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn broker() -> SimulatedBroker {
        SimulatedBroker::new(Arc::new(SyntheticMarketData::new()))
    }

    fn request(price: Option<Decimal>) -> OrderRequest {
        OrderRequest {
            user_id: UserId::new("u"),
            broker_id: BrokerId::new("oanda"),
            symbol: Symbol::new("EURUSD"),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: dec!(1000),
            price,
            product: None,
            exchange: None,
        }
    }

    #[tokio::test]
    async fn fills_at_requested_price() {
        let fill = broker().execute(&request(Some(dec!(1.2345)))).await.unwrap();
        assert_eq!(fill.quantity, dec!(1000));
        assert_eq!(fill.price, dec!(1.2345));
    }

    #[tokio::test]
    async fn market_order_fills_at_reference() {
        let fill = broker().execute(&request(None)).await.unwrap();
        assert_eq!(fill.price, dec!(1.1));
    }

    #[tokio::test]
    async fn handshake_issues_distinct_tokens() {
        let oanda = find_broker("oanda").unwrap();
        let tokens = broker()
            .handshake(oanda, &BrokerCredentials::new())
            .await
            .unwrap();
        assert_eq!(tokens.access_token.len(), TOKEN_BYTES * 2);
        assert_ne!(tokens.access_token, tokens.refresh_token);
    }
}
