/*
[INPUT]:  One newline-delimited JSON object from the pricing stream
[OUTPUT]: Classified StreamMessage (heartbeat or price)
[POS]:    Stream layer - message classification by `type` discriminator
[UPDATE]: When adding new message types or changing format
*/

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{OandaError, Result};
use crate::types::{ClientPrice, PricingHeartbeat};

pub const HEARTBEAT_TYPE: &str = "HEARTBEAT";
pub const PRICE_TYPE: &str = "PRICE";

/// Pricing stream message types
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum StreamMessage {
    #[serde(rename = "HEARTBEAT")]
    Heartbeat(PricingHeartbeat),
    #[serde(rename = "PRICE")]
    Price(ClientPrice),
}

impl StreamMessage {
    /// Wire value of the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            StreamMessage::Heartbeat(_) => HEARTBEAT_TYPE,
            StreamMessage::Price(_) => PRICE_TYPE,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        match self {
            StreamMessage::Heartbeat(heartbeat) => heartbeat.time,
            StreamMessage::Price(price) => price.time,
        }
    }

    /// Encode back into a single stream line
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl FromStr for StreamMessage {
    type Err = OandaError;

    fn from_str(line: &str) -> Result<Self> {
        classify(line)
    }
}

/// Decode one stream line, discriminating solely on its `type` field.
///
/// Unknown `type` values yield `UnknownMessageType`; anything else that fails
/// to decode yields `Malformed`.
pub fn classify(line: &str) -> Result<StreamMessage> {
    let value: Value = serde_json::from_str(line)
        .map_err(|err| OandaError::Malformed(format!("invalid json: {err}")))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| OandaError::Malformed("missing string `type` field".to_string()))?;

    match kind {
        HEARTBEAT_TYPE => serde_json::from_value(value)
            .map(StreamMessage::Heartbeat)
            .map_err(|err| OandaError::Malformed(format!("{HEARTBEAT_TYPE}: {err}"))),
        PRICE_TYPE => serde_json::from_value(value)
            .map(StreamMessage::Price)
            .map_err(|err| OandaError::Malformed(format!("{PRICE_TYPE}: {err}"))),
        other => Err(OandaError::UnknownMessageType(other.to_string())),
    }
}
