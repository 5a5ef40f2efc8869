/*
[INPUT]:  Method, URL and body per call; headers set ahead of time
[OUTPUT]: Raw response status and body bytes
[POS]:    HTTP layer - serialized, rate-limited request dispatch
[UPDATE]: When changing locking scope, header handling or limiter placement
*/

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Request, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{OandaError, Result};
use super::rate_limit::RateLimiter;

/// The mutable request shared by every call made through one dispatcher.
///
/// Headers accumulate until overwritten or reset; method, URL and body are
/// replaced on each call.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: Option<Url>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl RequestTemplate {
    /// Snapshot the template into an immutable request for a single call
    fn build(&self, client: &Client) -> Result<Request> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| OandaError::InvalidInput("request URL not set".to_string()))?;

        let mut builder = client
            .request(self.method.clone(), url)
            .headers(self.headers.clone());
        if !self.body.is_empty() {
            builder = builder.body(self.body.clone());
        }

        builder
            .build()
            .map_err(|err| OandaError::InvalidInput(err.to_string()))
    }
}

/// Response returned by the dispatcher regardless of status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl DispatchResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body, turning non-2xx statuses into `OandaError::Api`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if !self.is_success() {
            return Err(OandaError::api_error(self.status, api_error_message(&self.body)));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Serializes all outbound calls through one template.
///
/// The template lock is held across the limiter wait, the network round trip
/// and the full body read, so no two requests are ever in flight at once and
/// header changes never reach a request that is still pending.
#[derive(Debug)]
pub struct RequestDispatcher {
    http_client: Client,
    template: Mutex<RequestTemplate>,
    limiter: RateLimiter,
}

impl RequestDispatcher {
    pub fn new(http_client: Client, min_interval: Duration) -> Self {
        Self::with_headers(http_client, min_interval, HeaderMap::new())
    }

    /// Create a dispatcher whose template starts with `headers`
    pub fn with_headers(http_client: Client, min_interval: Duration, headers: HeaderMap) -> Self {
        Self {
            http_client,
            template: Mutex::new(RequestTemplate {
                headers,
                ..RequestTemplate::default()
            }),
            limiter: RateLimiter::new(min_interval),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn set_rate_limit(&self, min_interval: Duration) {
        self.limiter.set_interval(min_interval);
    }

    /// Set a header, replacing any existing values for the name
    pub async fn set_header(&self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.template.lock().await.headers.insert(name, value);
        Ok(())
    }

    /// Append a header value, keeping existing values for the name
    pub async fn add_header(&self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.template.lock().await.headers.append(name, value);
        Ok(())
    }

    /// Set `Authorization: Bearer <token>` for all subsequent calls
    pub async fn set_token(&self, token: &str) -> Result<()> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|err| OandaError::InvalidInput(format!("token: {err}")))?;
        value.set_sensitive(true);
        self.template.lock().await.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    pub async fn reset_headers(&self) {
        self.template.lock().await.headers.clear();
    }

    pub async fn headers(&self) -> HeaderMap {
        self.template.lock().await.headers.clone()
    }

    /// Render the current headers as `name: value\r\n` lines
    pub async fn header_string(&self) -> String {
        let headers = self.headers().await;
        headers
            .iter()
            .map(|(name, value)| {
                format!("{}: {}\r\n", name, value.to_str().unwrap_or("<non-ascii>"))
            })
            .collect()
    }

    /// Issue one request through the shared template.
    ///
    /// Non-success statuses are returned as-is; only URL, transport and body
    /// read failures are errors.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<DispatchResponse> {
        let mut template = self.template.lock().await;

        let parsed = Url::parse(url).map_err(|err| {
            warn!(url, error = %err, "rejecting request with malformed url");
            OandaError::InvalidInput(format!("{url}: {err}"))
        })?;

        self.limiter.wait().await;

        template.method = method;
        template.url = Some(parsed);
        template.body = body.unwrap_or_default();
        let request = template.build(&self.http_client)?;

        let request_id = Uuid::new_v4();
        debug!(
            %request_id,
            method = %request.method(),
            url = %request.url(),
            "dispatching request"
        );

        let response = self.http_client.execute(request).await.map_err(|err| {
            warn!(%request_id, url, error = %err, "request failed");
            OandaError::Transport(err)
        })?;
        let status = response.status();

        let body = response.bytes().await.map_err(|err| {
            warn!(%request_id, url, error = %err, "reading response body failed");
            OandaError::Transport(err)
        })?;
        drop(template);

        debug!(%request_id, status = status.as_u16(), bytes = body.len(), "response received");

        Ok(DispatchResponse {
            status,
            body: body.to_vec(),
        })
    }

    /// Same as `send`, but aborts the wait or round trip when `cancel` fires
    pub async fn send_cancellable(
        &self,
        cancel: &CancellationToken,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<DispatchResponse> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(OandaError::Cancelled),
            result = self.send(method, url, body) => result,
        }
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|err| OandaError::InvalidInput(format!("header name {name:?}: {err}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|err| OandaError::InvalidInput(format!("header value for {name}: {err}")))?;
    Ok((name, value))
}

pub(crate) fn api_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("errorMessage")
                .and_then(|message| message.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}
