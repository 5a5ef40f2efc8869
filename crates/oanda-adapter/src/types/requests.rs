/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust request structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{OrderPositionFill, OrderType, TimeInForce};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrderRequest {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub instrument: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub units: Decimal,
    pub time_in_force: TimeInForce,
    pub position_fill: OrderPositionFill,
}

impl MarketOrderRequest {
    /// Fill-or-kill market order; negative units sell
    pub fn new(instrument: impl Into<String>, units: i64) -> Self {
        Self {
            order_type: OrderType::Market,
            instrument: instrument.into(),
            units: Decimal::from(units),
            time_in_force: TimeInForce::Fok,
            position_fill: OrderPositionFill::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order: MarketOrderRequest,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn market_order_request_wire_shape() {
        let request = OrderRequest {
            order: MarketOrderRequest::new("EUR_USD", -250),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "order": {
                    "type": "MARKET",
                    "instrument": "EUR_USD",
                    "units": "-250",
                    "timeInForce": "FOK",
                    "positionFill": "DEFAULT"
                }
            })
        );
    }
}
