/*
[INPUT]:  Instrument and signed unit count
[OUTPUT]: Order submission response (raw transactions)
[POS]:    HTTP layer - order endpoint plumbing
[UPDATE]: When adding new order types or changing order flow
*/

use crate::http::{OandaClient, Result};
use crate::types::{MarketOrderRequest, OrderCreateResponse, OrderRequest};

impl OandaClient {
    /// Submit a fill-or-kill market order; negative units sell
    ///
    /// POST /v3/accounts/{account}/orders
    pub async fn post_market_order(
        &self,
        instrument: &str,
        units: i64,
    ) -> Result<OrderCreateResponse> {
        let url = self.account_url("/orders")?;
        let request = OrderRequest {
            order: MarketOrderRequest::new(instrument, units),
        };
        self.post_json(&url, &request).await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{Context, OandaClient};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_post_market_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/accounts/101-004-1/orders"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "order": {
                    "type": "MARKET",
                    "instrument": "EUR_USD",
                    "units": "100",
                    "timeInForce": "FOK",
                    "positionFill": "DEFAULT"
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "orderCreateTransaction": {"id": "13", "type": "MARKET_ORDER"},
                "relatedTransactionIDs": ["13", "14"],
                "lastTransactionID": "14"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OandaClient::new(Context {
            api_url: server.uri(),
            stream_url: server.uri(),
            token: "test-token".to_string(),
            account: "101-004-1".to_string(),
            application: String::new(),
        })
        .expect("client init");

        let response = client
            .post_market_order("EUR_USD", 100)
            .await
            .expect("post_market_order failed");

        assert_eq!(response.related_transaction_ids, vec!["13", "14"]);
        assert_eq!(response.last_transaction_id.as_deref(), Some("14"));
        assert!(response.order_fill_transaction.is_none());
    }
}
