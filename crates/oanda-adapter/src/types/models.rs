/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{DayOfWeek, Granularity, GuaranteedStopLossMode, InstrumentType};

/// One level of a price ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBucket {
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub liquidity: Decimal,
}

/// Price snapshot for one instrument, as served by both the pricing
/// endpoint and the pricing stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPrice {
    pub instrument: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub bids: Vec<PriceBucket>,
    #[serde(default)]
    pub asks: Vec<PriceBucket>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub closeout_bid: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub closeout_ask: Option<Decimal>,
    #[serde(default)]
    pub tradeable: bool,
}

/// Keep-alive emitted by the pricing stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingHeartbeat {
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prices {
    pub prices: Vec<ClientPrice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlestickData {
    #[serde(with = "rust_decimal::serde::str")]
    pub o: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub h: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub l: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub c: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candlestick {
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<CandlestickData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<CandlestickData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<CandlestickData>,
    pub volume: i64,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candles {
    pub instrument: String,
    pub granularity: Granularity,
    pub candles: Vec<Candlestick>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProperties {
    pub id: String,
    #[serde(rename = "mt4AccountID", default, skip_serializing_if = "Option::is_none")]
    pub mt4_account_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accounts {
    pub accounts: Vec<AccountProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSide {
    #[serde(with = "rust_decimal::serde::str")]
    pub units: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub average_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str")]
    pub pl: Decimal,
    #[serde(rename = "unrealizedPL", with = "rust_decimal::serde::str")]
    pub unrealized_pl: Decimal,
    #[serde(
        rename = "resettablePL",
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub resettable_pl: Decimal,
    #[serde(rename = "tradeIDs", default)]
    pub trade_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub instrument: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub pl: Decimal,
    #[serde(rename = "unrealizedPL", with = "rust_decimal::serde::str")]
    pub unrealized_pl: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub margin_used: Decimal,
    #[serde(
        rename = "resettablePL",
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub resettable_pl: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub commission: Decimal,
    pub long: PositionSide,
    pub short: PositionSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPositions {
    pub positions: Vec<Position>,
    #[serde(rename = "lastTransactionID", default)]
    pub last_transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPosition {
    pub position: Position,
    #[serde(rename = "lastTransactionID", default)]
    pub last_transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingDay {
    pub day_of_week: DayOfWeek,
    pub days_charged: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Financing {
    #[serde(with = "rust_decimal::serde::str")]
    pub long_rate: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub short_rate: Decimal,
    #[serde(default)]
    pub financing_days_of_week: Vec<FinancingDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub name: String,
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
    pub display_name: String,
    pub pip_location: i32,
    pub display_precision: u32,
    pub trade_units_precision: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub minimum_trade_size: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub maximum_trailing_stop_distance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub minimum_trailing_stop_distance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub maximum_position_size: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub maximum_order_units: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub margin_rate: Decimal,
    #[serde(default)]
    pub guaranteed_stop_loss_order_mode: GuaranteedStopLossMode,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financing: Option<Financing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruments {
    pub instruments: Vec<Instrument>,
    #[serde(rename = "lastTransactionID", default, skip_serializing_if = "Option::is_none")]
    pub last_transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionBookBucket {
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub long_count_percent: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub short_count_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionBookData {
    pub instrument: String,
    pub time: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub bucket_width: Decimal,
    pub buckets: Vec<PositionBookBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionBook {
    #[serde(rename = "positionBook")]
    pub position_book: PositionBookData,
}

mod serde_helpers {
    use super::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use std::str::FromStr;

    pub fn deserialize_decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Decimal::ZERO);
        }

        if let Some(raw) = value.as_str() {
            if raw.trim().is_empty() {
                return Ok(Decimal::ZERO);
            }
            return Decimal::from_str(raw).map_err(serde::de::Error::custom);
        }

        if value.is_number() {
            return Decimal::from_str(&value.to_string()).map_err(serde::de::Error::custom);
        }

        Err(serde::de::Error::custom("invalid decimal value"))
    }

    pub fn serialize_decimal<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn client_price_accepts_numeric_liquidity() {
        let value = json!({
            "type": "PRICE",
            "instrument": "EUR_USD",
            "time": "2016-06-22T18:41:36.201836422Z",
            "bids": [{"price": "1.13203", "liquidity": 10000000}],
            "asks": [{"price": "1.13222", "liquidity": "10000000"}],
            "closeoutBid": "1.13188",
            "closeoutAsk": "1.13237",
            "tradeable": true
        });

        let price: ClientPrice = serde_json::from_value(value).expect("price should deserialize");

        assert_eq!(price.bids[0].price, Decimal::from_str("1.13203").unwrap());
        assert_eq!(price.bids[0].liquidity, Decimal::from(10_000_000));
        assert_eq!(price.asks[0].liquidity, Decimal::from(10_000_000));
        assert_eq!(price.closeout_ask, Some(Decimal::from_str("1.13237").unwrap()));
        assert!(price.tradeable);
    }

    #[test]
    fn client_price_tolerates_missing_closeouts() {
        let value = json!({
            "instrument": "EUR_USD",
            "time": "2016-06-22T18:41:36Z",
            "bids": [],
            "asks": []
        });

        let price: ClientPrice = serde_json::from_value(value).expect("price should deserialize");

        assert_eq!(price.closeout_bid, None);
        assert!(!price.tradeable);
    }

    #[test]
    fn position_deserializes_without_optional_fields() {
        let value = json!({
            "instrument": "EUR_USD",
            "pl": "-12.5",
            "unrealizedPL": "3.25",
            "long": {"units": "100", "averagePrice": "1.1000", "pl": "0", "unrealizedPL": "3.25", "tradeIDs": ["42"]},
            "short": {"units": "0", "pl": "-12.5", "unrealizedPL": "0"}
        });

        let position: Position = serde_json::from_value(value).expect("position should deserialize");

        assert_eq!(position.margin_used, Decimal::ZERO);
        assert_eq!(position.long.trade_ids, vec!["42".to_string()]);
        assert_eq!(position.short.average_price, None);
    }

    #[test]
    fn instrument_reads_string_encoded_numbers() {
        let value = json!({
            "name": "EUR_USD",
            "type": "CURRENCY",
            "displayName": "EUR/USD",
            "pipLocation": -4,
            "displayPrecision": 5,
            "tradeUnitsPrecision": 0,
            "minimumTradeSize": "1",
            "maximumTrailingStopDistance": "1.00000",
            "minimumTrailingStopDistance": "0.00050",
            "maximumPositionSize": "0",
            "maximumOrderUnits": "100000000",
            "marginRate": "0.0333",
            "guaranteedStopLossOrderMode": "ALLOWED",
            "tags": [{"type": "ASSET_CLASS", "name": "CURRENCY"}],
            "financing": {
                "longRate": "-0.0176",
                "shortRate": "0.0045",
                "financingDaysOfWeek": [{"dayOfWeek": "MONDAY", "daysCharged": 1}]
            }
        });

        let instrument: Instrument =
            serde_json::from_value(value).expect("instrument should deserialize");

        assert_eq!(instrument.instrument_type, InstrumentType::Currency);
        assert_eq!(instrument.margin_rate, Decimal::from_str("0.0333").unwrap());
        assert_eq!(instrument.guaranteed_stop_loss_order_mode, GuaranteedStopLossMode::Allowed);
        let financing = instrument.financing.expect("financing present");
        assert_eq!(financing.financing_days_of_week[0].day_of_week, DayOfWeek::Monday);
    }
}
