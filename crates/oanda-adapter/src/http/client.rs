/*
[INPUT]:  Context (base URLs, token, account) and HTTP configuration
[OUTPUT]: Configured client whose endpoints share one request dispatcher
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::http::dispatcher::RequestDispatcher;
use crate::http::error::{OandaError, Result};
use crate::http::rate_limit::DEFAULT_MIN_INTERVAL;
use crate::types::Environment;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Floor between consecutive request starts
    pub min_request_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            min_request_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

/// Endpoint and credential context shared by the REST and stream clients
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub api_url: String,
    pub stream_url: String,
    pub token: String,
    pub account: String,
    pub application: String,
}

impl Context {
    /// Context for one of the hosted environments
    pub fn for_environment(
        environment: Environment,
        token: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            api_url: environment.api_url().to_string(),
            stream_url: environment.stream_url().to_string(),
            token: token.into(),
            account: account.into(),
            application: String::new(),
        }
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }

    pub fn has_account(&self) -> bool {
        !self.account.trim().is_empty()
    }
}

/// Main REST client for the OANDA v3 API.
///
/// Clones share the same dispatcher, so every request made through any clone
/// is serialized and spaced by the same rate limiter.
#[derive(Debug, Clone)]
pub struct OandaClient {
    dispatcher: Arc<RequestDispatcher>,
    context: Context,
    config: ClientConfig,
}

impl OandaClient {
    /// Create a new client with default configuration
    pub fn new(context: Context) -> Result<Self> {
        Self::with_config(context, ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(context: Context, config: ClientConfig) -> Result<Self> {
        Url::parse(&context.api_url)?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !context.token.is_empty() {
            let mut auth = HeaderValue::from_str(&format!("Bearer {}", context.token))
                .map_err(|err| OandaError::Config(format!("invalid token: {err}")))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let dispatcher = RequestDispatcher::with_headers(
            http_client,
            config.min_request_interval,
            headers,
        );

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            context,
            config,
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared dispatcher, for header and rate limit adjustments
    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    /// Client bound to another account, sharing this client's dispatcher
    pub fn with_account(&self, account: impl Into<String>) -> Self {
        let mut context = self.context.clone();
        context.account = account.into();
        Self {
            dispatcher: self.dispatcher.clone(),
            context,
            config: self.config.clone(),
        }
    }

    /// Build full URL for endpoints outside an account
    pub(crate) fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.context.api_url.trim_end_matches('/'), endpoint)
    }

    /// Build full URL for `/v3/accounts/{account}` endpoints
    pub(crate) fn account_url(&self, endpoint: &str) -> Result<String> {
        if !self.context.has_account() {
            return Err(OandaError::InvalidInput(
                "account id is required for this endpoint".to_string(),
            ));
        }
        Ok(self.api_url(&format!(
            "/v3/accounts/{}{}",
            self.context.account, endpoint
        )))
    }

    /// Instrument name checked for use as a single URL path segment
    pub(crate) fn instrument_segment(instrument: &str) -> Result<&str> {
        let valid = !instrument.is_empty()
            && instrument
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(instrument)
        } else {
            Err(OandaError::InvalidInput(format!(
                "instrument {instrument:?} is not a valid path segment"
            )))
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.dispatcher.send(Method::GET, url, None).await?;
        response.json()
    }

    pub(crate) async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let response = self.dispatcher.send(Method::POST, url, Some(payload)).await?;
        response.json()
    }
}
