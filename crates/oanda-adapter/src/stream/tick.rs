/*
[INPUT]:  ClientPrice messages from the pricing stream
[OUTPUT]: Tick (instrument, time, top-of-book bid/ask and mid)
[POS]:    Stream layer - price normalization
[UPDATE]: When changing mid-price rounding or tick fields
*/

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::http::{OandaError, Result};
use crate::types::ClientPrice;

/// Top-of-book snapshot derived from a price message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: String,
    pub time: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub mid: Decimal,
}

impl Tick {
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} bid={} ask={} mid={}",
            self.instrument,
            self.time.to_rfc3339(),
            self.bid,
            self.ask,
            self.mid
        )
    }
}

impl TryFrom<&ClientPrice> for Tick {
    type Error = OandaError;

    fn try_from(price: &ClientPrice) -> Result<Self> {
        normalize(price)
    }
}

/// Reduce a price message to its best bid, best ask and mid.
///
/// The first entry of each ladder is the best level. The mid is exact and is
/// never rendered with fewer decimal places than the more precise quote.
pub fn normalize(price: &ClientPrice) -> Result<Tick> {
    let bid = price
        .bids
        .first()
        .map(|bucket| bucket.price)
        .ok_or_else(|| OandaError::Malformed(format!("{}: price has no bids", price.instrument)))?;
    let ask = price
        .asks
        .first()
        .map(|bucket| bucket.price)
        .ok_or_else(|| OandaError::Malformed(format!("{}: price has no asks", price.instrument)))?;

    let scale = bid.scale().max(ask.scale());
    let mut mid = bid
        .checked_add(ask)
        .and_then(|sum| sum.checked_div(Decimal::TWO))
        .ok_or_else(|| {
            OandaError::Malformed(format!("{}: mid of {bid} and {ask} overflows", price.instrument))
        })?;
    if mid.scale() < scale {
        mid.rescale(scale);
    }

    Ok(Tick {
        instrument: price.instrument.clone(),
        time: price.time,
        bid,
        ask,
        mid,
    })
}
