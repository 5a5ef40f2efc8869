/*
[INPUT]:  Instrument identifiers and query parameters
[OUTPUT]: Market data (prices, candles, instruments, position books)
[POS]:    HTTP layer - market data endpoints
[UPDATE]: When adding new market data endpoints or changing response format
*/

use url::form_urlencoded;

use crate::http::{OandaClient, Result};
use crate::types::{Candles, Granularity, Instruments, PositionBook, PriceComponent, Prices};

impl OandaClient {
    /// Fetch current prices for a list of instruments
    ///
    /// GET /v3/accounts/{account}/pricing?instruments={csv}
    pub async fn get_pricing(&self, instruments: &[&str]) -> Result<Prices> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("instruments", &instruments.join(","))
            .finish();
        let url = self.account_url(&format!("/pricing?{query}"))?;
        self.get_json(&url).await
    }

    /// Fetch the most recent `count` candles
    ///
    /// GET /v3/accounts/{account}/instruments/{instrument}/candles?price=..&granularity=..&count=..
    pub async fn get_candles(
        &self,
        instrument: &str,
        count: u32,
        granularity: Granularity,
        price_component: PriceComponent,
    ) -> Result<Candles> {
        self.candles_request(instrument)
            .count(count)
            .granularity(granularity)
            .price_component(price_component)
            .send()
            .await
    }

    /// Start a candle query with every optional parameter unset
    pub fn candles_request(&self, instrument: &str) -> CandlesRequest<'_> {
        CandlesRequest::new(self, instrument)
    }

    /// List tradeable instruments for the account
    ///
    /// GET /v3/accounts/{account}/instruments
    pub async fn get_instruments(&self) -> Result<Instruments> {
        let url = self.account_url("/instruments")?;
        self.get_json(&url).await
    }

    /// Latest position book snapshot for an instrument
    ///
    /// GET /v3/instruments/{instrument}/positionBook
    pub async fn get_position_book(&self, instrument: &str) -> Result<PositionBook> {
        let instrument = Self::instrument_segment(instrument)?;
        let url = self.api_url(&format!("/v3/instruments/{instrument}/positionBook"));
        self.get_json(&url).await
    }
}

/// Builder for the candles endpoint
#[derive(Debug, Clone)]
pub struct CandlesRequest<'a> {
    client: &'a OandaClient,
    instrument: String,
    count: Option<u32>,
    granularity: Granularity,
    price_component: PriceComponent,
    from: Option<String>,
    to: Option<String>,
    include_first: bool,
    include_last: bool,
    daily_alignment: Option<u32>,
    alignment_timezone: Option<String>,
    weekly_alignment: Option<String>,
}

impl<'a> CandlesRequest<'a> {
    fn new(client: &'a OandaClient, instrument: &str) -> Self {
        Self {
            client,
            instrument: instrument.to_string(),
            count: None,
            granularity: Granularity::S5,
            price_component: PriceComponent::AskBidMid,
            from: None,
            to: None,
            include_first: false,
            include_last: false,
            daily_alignment: None,
            alignment_timezone: None,
            weekly_alignment: None,
        }
    }

    pub fn instrument(mut self, instrument: &str) -> Self {
        self.instrument = instrument.to_string();
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn price_component(mut self, price_component: PriceComponent) -> Self {
        self.price_component = price_component;
        self
    }

    /// RFC 3339 or UNIX timestamp of the first candle
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn include_first(mut self, include_first: bool) -> Self {
        self.include_first = include_first;
        self
    }

    pub fn include_last(mut self, include_last: bool) -> Self {
        self.include_last = include_last;
        self
    }

    pub fn daily_alignment(mut self, hour: u32) -> Self {
        self.daily_alignment = Some(hour);
        self
    }

    pub fn alignment_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.alignment_timezone = Some(timezone.into());
        self
    }

    pub fn weekly_alignment(mut self, day: impl Into<String>) -> Self {
        self.weekly_alignment = Some(day.into());
        self
    }

    /// Query string for the current parameters, without the leading `?`
    pub fn query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("price", self.price_component.as_str())
            .append_pair("granularity", self.granularity.as_str());
        if let Some(count) = self.count {
            query.append_pair("count", &count.to_string());
        }
        if let Some(from) = &self.from {
            query.append_pair("from", from);
        }
        if let Some(to) = &self.to {
            query.append_pair("to", to);
        }
        if self.include_first {
            query.append_pair("includeFirst", "true");
        }
        if self.include_last {
            query.append_pair("includeLast", "true");
        }
        if let Some(hour) = self.daily_alignment {
            query.append_pair("dailyAlignment", &hour.to_string());
        }
        if let Some(timezone) = &self.alignment_timezone {
            query.append_pair("alignmentTimezone", timezone);
        }
        if let Some(day) = &self.weekly_alignment {
            query.append_pair("weeklyAlignment", day);
        }
        query.finish()
    }

    pub async fn send(self) -> Result<Candles> {
        let instrument = OandaClient::instrument_segment(&self.instrument)?;
        let url = self.client.account_url(&format!(
            "/instruments/{}/candles?{}",
            instrument,
            self.query()
        ))?;
        tracing::debug!(%url, "requesting candles");
        self.client.get_json(&url).await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{Context, OandaClient, OandaError};
    use crate::types::{Granularity, InstrumentType, PriceComponent};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OandaClient {
        OandaClient::new(Context {
            api_url: server.uri(),
            stream_url: server.uri(),
            token: "test-token".to_string(),
            account: "101-004-1".to_string(),
            application: "tests".to_string(),
        })
        .expect("client init")
    }

    #[tokio::test]
    async fn test_get_pricing() {
        let server = MockServer::start().await;
        let mock_response = r#"{
            "time": "2016-06-22T18:41:36.201836422Z",
            "prices": [{
                "type": "PRICE",
                "instrument": "EUR_USD",
                "time": "2016-06-22T18:41:29.285426022Z",
                "bids": [{"price": "1.13203", "liquidity": 10000000}],
                "asks": [{"price": "1.13222", "liquidity": 10000000}],
                "closeoutBid": "1.13188",
                "closeoutAsk": "1.13237",
                "tradeable": true
            }]
        }"#;

        Mock::given(method("GET"))
            .and(path("/v3/accounts/101-004-1/pricing"))
            .and(query_param("instruments", "EUR_USD,USD_JPY"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let prices = client(&server)
            .get_pricing(&["EUR_USD", "USD_JPY"])
            .await
            .expect("get_pricing failed");

        assert_eq!(prices.prices.len(), 1);
        assert_eq!(prices.prices[0].instrument, "EUR_USD");
        assert_eq!(prices.prices[0].asks[0].price, Decimal::from_str("1.13222").unwrap());
    }

    #[tokio::test]
    async fn test_get_candles() {
        let server = MockServer::start().await;
        let mock_response = r#"{
            "instrument": "EUR_USD",
            "granularity": "M1",
            "candles": [{
                "time": "2024-01-02T10:00:00.000000000Z",
                "mid": {"o": "1.10000", "h": "1.10020", "l": "1.09990", "c": "1.10010"},
                "volume": 42,
                "complete": true
            }]
        }"#;

        Mock::given(method("GET"))
            .and(path("/v3/accounts/101-004-1/instruments/EUR_USD/candles"))
            .and(query_param("price", "M"))
            .and(query_param("granularity", "M1"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let candles = client(&server)
            .get_candles("EUR_USD", 1, Granularity::M1, PriceComponent::Mid)
            .await
            .expect("get_candles failed");

        assert_eq!(candles.granularity, Granularity::M1);
        let mid = candles.candles[0].mid.as_ref().expect("mid candle");
        assert_eq!(mid.c, Decimal::from_str("1.10010").unwrap());
        assert!(candles.candles[0].bid.is_none());
    }

    #[tokio::test]
    async fn test_candles_request_builder_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/accounts/101-004-1/instruments/USD_JPY/candles"))
            .and(query_param("price", "ABM"))
            .and(query_param("granularity", "H1"))
            .and(query_param("from", "2024-01-01T00:00:00Z"))
            .and(query_param("includeFirst", "true"))
            .and(query_param("dailyAlignment", "17"))
            .and(query_param("alignmentTimezone", "America/New_York"))
            .and(query_param_is_missing("count"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"instrument":"USD_JPY","granularity":"H1","candles":[]}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let candles = client
            .candles_request("EUR_USD")
            .instrument("USD_JPY")
            .granularity(Granularity::H1)
            .from("2024-01-01T00:00:00Z")
            .include_first(true)
            .daily_alignment(17)
            .alignment_timezone("America/New_York")
            .send()
            .await
            .expect("candles request failed");

        assert_eq!(candles.instrument, "USD_JPY");
        assert!(candles.candles.is_empty());
    }

    #[test]
    fn candles_query_defaults() {
        let client = OandaClient::new(Context {
            api_url: "https://api-fxpractice.oanda.com".to_string(),
            account: "1".to_string(),
            ..Context::default()
        })
        .expect("client init");

        let query = client.candles_request("EUR_USD").query();
        assert_eq!(query, "price=ABM&granularity=S5");
    }

    #[tokio::test]
    async fn test_get_instruments() {
        let server = MockServer::start().await;
        let mock_response = r#"{
            "instruments": [{
                "name": "XAU_USD",
                "type": "METAL",
                "displayName": "Gold",
                "pipLocation": -2,
                "displayPrecision": 3,
                "tradeUnitsPrecision": 0,
                "minimumTradeSize": "1",
                "maximumTrailingStopDistance": "1000.000",
                "minimumTrailingStopDistance": "0.050",
                "maximumPositionSize": "0",
                "maximumOrderUnits": "500000",
                "marginRate": "0.05"
            }],
            "lastTransactionID": "7"
        }"#;

        Mock::given(method("GET"))
            .and(path("/v3/accounts/101-004-1/instruments"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let instruments = client(&server)
            .get_instruments()
            .await
            .expect("get_instruments failed");

        assert_eq!(instruments.instruments[0].instrument_type, InstrumentType::Metal);
        assert_eq!(instruments.last_transaction_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_get_position_book() {
        let server = MockServer::start().await;
        let mock_response = r#"{
            "positionBook": {
                "instrument": "EUR_USD",
                "time": "2024-01-02T10:00:00Z",
                "price": "1.10000",
                "bucketWidth": "0.00050",
                "buckets": [
                    {"price": "1.09950", "longCountPercent": "0.2", "shortCountPercent": "0.1"}
                ]
            }
        }"#;

        Mock::given(method("GET"))
            .and(path("/v3/instruments/EUR_USD/positionBook"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let book = client(&server)
            .get_position_book("EUR_USD")
            .await
            .expect("get_position_book failed");

        assert_eq!(book.position_book.bucket_width, Decimal::from_str("0.0005").unwrap());
        assert_eq!(book.position_book.buckets.len(), 1);
    }

    #[tokio::test]
    async fn test_instrument_with_path_characters_is_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client
            .get_position_book("EUR_USD/../../accounts")
            .await
            .expect_err("slash in instrument");
        assert!(err.is_invalid_input());

        let err = client
            .candles_request("EUR_USD?count=5000")
            .send()
            .await
            .expect_err("query in instrument");
        assert!(matches!(err, OandaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_error_status_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/accounts/101-004-1/pricing"))
            .respond_with(ResponseTemplate::new(400).set_body_raw(
                r#"{"errorMessage":"Invalid value specified for 'instruments'"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_pricing(&["NOPE"])
            .await
            .expect_err("400 must fail");

        match err {
            OandaError::Api { code, message } => {
                assert_eq!(code, 400);
                assert!(message.contains("instruments"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
