/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hosted OANDA environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Practice,
    Live,
}

impl Environment {
    pub const API_URL_PRACTICE: &'static str = "https://api-fxpractice.oanda.com";
    pub const STREAM_URL_PRACTICE: &'static str = "https://stream-fxpractice.oanda.com";
    pub const API_URL_LIVE: &'static str = "https://api-fxtrade.oanda.com";
    pub const STREAM_URL_LIVE: &'static str = "https://stream-fxtrade.oanda.com";

    pub fn api_url(self) -> &'static str {
        match self {
            Environment::Practice => Self::API_URL_PRACTICE,
            Environment::Live => Self::API_URL_LIVE,
        }
    }

    pub fn stream_url(self) -> &'static str {
        match self {
            Environment::Practice => Self::STREAM_URL_PRACTICE,
            Environment::Live => Self::STREAM_URL_LIVE,
        }
    }
}

/// Which sides of a candle to request: ask, bid, mid or combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceComponent {
    #[serde(rename = "A")]
    Ask,
    #[serde(rename = "B")]
    Bid,
    #[serde(rename = "M")]
    Mid,
    #[serde(rename = "AB")]
    AskBid,
    #[serde(rename = "AM")]
    AskMid,
    #[serde(rename = "BM")]
    BidMid,
    #[serde(rename = "ABM")]
    AskBidMid,
}

impl PriceComponent {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceComponent::Ask => "A",
            PriceComponent::Bid => "B",
            PriceComponent::Mid => "M",
            PriceComponent::AskBid => "AB",
            PriceComponent::AskMid => "AM",
            PriceComponent::BidMid => "BM",
            PriceComponent::AskBidMid => "ABM",
        }
    }
}

impl fmt::Display for PriceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    S5,
    S10,
    S15,
    S30,
    M1,
    M2,
    M4,
    M5,
    M10,
    M15,
    M30,
    H1,
    H2,
    H3,
    H4,
    H6,
    H8,
    H12,
    D,
    W,
    M,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::S5 => "S5",
            Granularity::S10 => "S10",
            Granularity::S15 => "S15",
            Granularity::S30 => "S30",
            Granularity::M1 => "M1",
            Granularity::M2 => "M2",
            Granularity::M4 => "M4",
            Granularity::M5 => "M5",
            Granularity::M10 => "M10",
            Granularity::M15 => "M15",
            Granularity::M30 => "M30",
            Granularity::H1 => "H1",
            Granularity::H2 => "H2",
            Granularity::H3 => "H3",
            Granularity::H4 => "H4",
            Granularity::H6 => "H6",
            Granularity::H8 => "H8",
            Granularity::H12 => "H12",
            Granularity::D => "D",
            Granularity::W => "W",
            Granularity::M => "M",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    Currency,
    Cfd,
    Metal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuaranteedStopLossMode {
    #[default]
    Disabled,
    Allowed,
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    MarketIfTouched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
    Gtd,
    Gfd,
    Fok,
    Ioc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderPositionFill {
    OpenOnly,
    ReduceFirst,
    ReduceOnly,
    #[default]
    Default,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_component_serializes_to_wire_code() {
        let encoded = serde_json::to_string(&PriceComponent::AskBidMid).unwrap();
        assert_eq!(encoded, r#""ABM""#);
        assert_eq!(PriceComponent::BidMid.to_string(), "BM");
    }

    #[test]
    fn granularity_display_matches_serde() {
        for granularity in [Granularity::S5, Granularity::M1, Granularity::H12, Granularity::M] {
            let encoded = serde_json::to_string(&granularity).unwrap();
            assert_eq!(encoded.trim_matches('"'), granularity.as_str());
        }
    }

    #[test]
    fn screaming_case_enums_decode() {
        let kind: InstrumentType = serde_json::from_str(r#""CURRENCY""#).unwrap();
        assert_eq!(kind, InstrumentType::Currency);

        let fill: OrderPositionFill = serde_json::from_str(r#""REDUCE_FIRST""#).unwrap();
        assert_eq!(fill, OrderPositionFill::ReduceFirst);

        let order_type: OrderType = serde_json::from_str(r#""MARKET_IF_TOUCHED""#).unwrap();
        assert_eq!(order_type, OrderType::MarketIfTouched);
    }
}
