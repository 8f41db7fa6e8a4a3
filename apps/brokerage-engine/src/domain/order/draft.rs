//! Order drafts and validated order requests.
//!
//! A draft is what a caller submits; every field is optional so that
//! missing fields surface as `INVALID_ORDER` instead of a decode failure.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{OrderSide, OrderType};
use crate::domain::shared::{BrokerId, Symbol, UserId};
use crate::error::EngineError;

/// Unvalidated order as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    /// Owning user.
    pub user_id: Option<String>,
    /// Broker to route to.
    pub broker_id: Option<String>,
    /// Instrument symbol.
    pub symbol: Option<String>,
    /// `buy` or `sell`.
    pub side: Option<String>,
    /// `market` (default), `limit`, `stop` or `stop_limit`.
    #[serde(rename = "type", alias = "orderType")]
    pub order_type: Option<String>,
    /// Requested quantity.
    pub quantity: Option<Decimal>,
    /// Requested price.
    pub price: Option<Decimal>,
    /// Product tag (e.g. `CNC`, `MIS`, `spot`).
    pub product: Option<String>,
    /// Exchange tag.
    pub exchange: Option<String>,
}

/// Validated order request handed to the broker adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Owning user.
    pub user_id: UserId,
    /// Broker to route to.
    pub broker_id: BrokerId,
    /// Normalized instrument symbol.
    pub symbol: Symbol,
    /// Side.
    pub side: OrderSide,
    /// Type.
    pub order_type: OrderType,
    /// Requested quantity, strictly positive.
    pub quantity: Decimal,
    /// Requested price, strictly positive when present.
    pub price: Option<Decimal>,
    /// Product tag.
    pub product: Option<String>,
    /// Exchange tag.
    pub exchange: Option<String>,
}

impl OrderDraft {
    /// Validate required fields and build an [`OrderRequest`].
    ///
    /// # Errors
    ///
    /// Returns `INVALID_ORDER` naming the first offending field.
    pub fn validate(self) -> Result<OrderRequest, EngineError> {
        let user_id = required(self.user_id, "userId")?;
        let broker_id = required(self.broker_id, "brokerId")?;
        let symbol = required(self.symbol, "symbol")?;
        let side = required(self.side, "side")?
            .parse::<OrderSide>()
            .map_err(|e| EngineError::invalid_order("side", e))?;

        let order_type = match self.order_type.as_deref().map(str::trim) {
            None | Some("") => OrderType::default(),
            Some(raw) => raw
                .parse::<OrderType>()
                .map_err(|e| EngineError::invalid_order("type", e))?,
        };

        let quantity = self
            .quantity
            .ok_or_else(|| EngineError::invalid_order("quantity", "quantity is required"))?;
        if quantity <= Decimal::ZERO {
            return Err(
                EngineError::invalid_order("quantity", "quantity must be greater than zero")
                    .with_context("value", quantity.to_string()),
            );
        }

        if let Some(price) = self.price
            && price <= Decimal::ZERO
        {
            return Err(
                EngineError::invalid_order("price", "price must be greater than zero")
                    .with_context("value", price.to_string()),
            );
        }

        if order_type.requires_price() && self.price.is_none() {
            return Err(EngineError::invalid_order(
                "price",
                "limit orders require a price",
            ));
        }

        Ok(OrderRequest {
            user_id: UserId::new(user_id.trim()),
            broker_id: BrokerId::normalized(&broker_id),
            symbol: Symbol::normalized(&symbol),
            side,
            order_type,
            quantity,
            price: self.price,
            product: non_blank(self.product),
            exchange: non_blank(self.exchange),
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, EngineError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EngineError::invalid_order(
            field,
            format!("{field} is required"),
        )),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn draft() -> OrderDraft {
        OrderDraft {
            user_id: Some("u-1".to_string()),
            broker_id: Some("OANDA".to_string()),
            symbol: Some("eurusd".to_string()),
            side: Some("buy".to_string()),
            order_type: None,
            quantity: Some(dec!(100)),
            price: Some(dec!(1.1000)),
            product: Some(" spot ".to_string()),
            exchange: None,
        }
    }

    fn field_of(err: &EngineError) -> Option<&str> {
        err.context()
            .iter()
            .find(|(k, _)| k == "field")
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn valid_draft_normalizes_fields() {
        let request = draft().validate().unwrap();
        assert_eq!(request.symbol.as_str(), "EURUSD");
        assert_eq!(request.broker_id.as_str(), "oanda");
        assert_eq!(request.order_type, OrderType::Market);
        assert_eq!(request.product.as_deref(), Some("spot"));
        assert_eq!(request.exchange, None);
    }

    #[test_case(|d: &mut OrderDraft| d.user_id = None, "userId" ; "missing user")]
    #[test_case(|d: &mut OrderDraft| d.broker_id = Some("  ".to_string()), "brokerId" ; "blank broker")]
    #[test_case(|d: &mut OrderDraft| d.symbol = None, "symbol" ; "missing symbol")]
    #[test_case(|d: &mut OrderDraft| d.side = None, "side" ; "missing side")]
    #[test_case(|d: &mut OrderDraft| d.side = Some("hold".to_string()), "side" ; "bad side")]
    #[test_case(|d: &mut OrderDraft| d.quantity = None, "quantity" ; "missing quantity")]
    #[test_case(|d: &mut OrderDraft| d.quantity = Some(Decimal::ZERO), "quantity" ; "zero quantity")]
    #[test_case(|d: &mut OrderDraft| d.quantity = Some(dec!(-5)), "quantity" ; "negative quantity")]
    #[test_case(|d: &mut OrderDraft| d.price = Some(dec!(0)), "price" ; "zero price")]
    #[test_case(|d: &mut OrderDraft| d.order_type = Some("twap".to_string()), "type" ; "bad type")]
    fn invalid_drafts_rejected(mutate: fn(&mut OrderDraft), field: &str) {
        let mut d = draft();
        mutate(&mut d);
        let err = d.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOrder);
        assert_eq!(field_of(&err), Some(field));
    }

    #[test]
    fn limit_without_price_rejected() {
        let mut d = draft();
        d.order_type = Some("limit".to_string());
        d.price = None;
        let err = d.validate().unwrap_err();
        assert_eq!(field_of(&err), Some("price"));
    }

    #[test]
    fn market_without_price_accepted() {
        let mut d = draft();
        d.price = None;
        assert!(d.validate().unwrap().price.is_none());
    }

    #[test]
    fn draft_deserializes_type_field() {
        let d: OrderDraft = serde_json::from_str(
            r#"{"userId":"u","symbol":"AAPL","side":"sell","type":"limit","quantity":5,"price":"190.5"}"#,
        )
        .unwrap();
        assert_eq!(d.order_type.as_deref(), Some("limit"));
        assert_eq!(d.quantity, Some(dec!(5)));
        assert_eq!(d.price, Some(dec!(190.5)));
    }
}
