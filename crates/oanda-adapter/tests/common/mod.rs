/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for oanda-adapter tests

#![allow(dead_code)]

use oanda_adapter::Context;
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_ACCOUNT: &str = "101-004-1234567-001";

pub const HEARTBEAT_LINE: &str = r#"{"type":"HEARTBEAT","time":"2024-05-01T10:00:00.000000000Z"}"#;
pub const PRICE_LINE: &str = r#"{"type":"PRICE","instrument":"EUR_USD","time":"2024-05-01T10:00:01.000000000Z","bids":[{"price":"1.0999","liquidity":1000000},{"price":"1.0998","liquidity":2000000}],"asks":[{"price":"1.1001","liquidity":1000000}],"closeoutBid":"1.0997","closeoutAsk":"1.1003","status":"tradeable","tradeable":true}"#;
pub const UNKNOWN_LINE: &str = r#"{"type":"ORDER_FILL","time":"2024-05-01T10:00:02.000000000Z"}"#;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Context pointing both REST and stream traffic at the mock server
pub fn mock_context(server: &MockServer) -> Context {
    Context {
        api_url: server.uri(),
        stream_url: server.uri(),
        token: TEST_TOKEN.to_string(),
        account: TEST_ACCOUNT.to_string(),
        application: String::new(),
    }
}

/// Join lines into a newline-delimited stream body
pub fn stream_body(lines: &[&str]) -> String {
    let mut body = lines.join("\n");
    body.push('\n');
    body
}

pub fn pricing_stream_path() -> String {
    format!("/v3/accounts/{TEST_ACCOUNT}/pricing/stream")
}
