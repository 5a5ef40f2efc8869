/*
[INPUT]:  Context (stream URL, token, account), instrument list, cancellation token
[OUTPUT]: StreamReader over an open pricing stream connection
[POS]:    Stream layer - connection establishment for the pricing stream
[UPDATE]: When changing stream endpoints, auth headers or connect behavior
*/

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::http::dispatcher::api_error_message;
use crate::http::{ClientConfig, Context, OandaClient, OandaError, Result};
use crate::stream::reader::StreamReader;

/// Opens pricing stream connections.
///
/// Uses its own HTTP client without an overall request timeout, since a
/// stream body stays open indefinitely. Only connecting is bounded.
#[derive(Debug, Clone)]
pub struct OandaStreamClient {
    http_client: Client,
    context: Context,
}

impl OandaStreamClient {
    pub fn new(context: Context) -> Result<Self> {
        Self::with_config(context, &ClientConfig::default())
    }

    pub fn with_config(context: Context, config: &ClientConfig) -> Result<Self> {
        Url::parse(&context.stream_url)?;

        let mut headers = HeaderMap::new();
        if !context.token.is_empty() {
            let mut auth = HeaderValue::from_str(&format!("Bearer {}", context.token))
                .map_err(|err| OandaError::Config(format!("invalid token: {err}")))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let http_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            context,
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Build `<stream_url>/v3/accounts/<account>/pricing/stream?instruments=<csv>`
    pub fn pricing_stream_url<S: AsRef<str>>(&self, instruments: &[S]) -> Result<Url> {
        if !self.context.has_account() {
            return Err(OandaError::InvalidInput(
                "account id is required for the pricing stream".to_string(),
            ));
        }

        let instruments: Vec<&str> = instruments
            .iter()
            .map(|instrument| instrument.as_ref().trim())
            .filter(|instrument| !instrument.is_empty())
            .collect();
        if instruments.is_empty() {
            return Err(OandaError::InvalidInput(
                "at least one instrument is required".to_string(),
            ));
        }

        let base = self.context.stream_url.trim_end_matches('/');
        let mut url = Url::parse(&format!(
            "{base}/v3/accounts/{}/pricing/stream",
            self.context.account
        ))
        .map_err(|err| OandaError::InvalidInput(format!("stream url: {err}")))?;
        url.query_pairs_mut()
            .append_pair("instruments", &instruments.join(","));
        Ok(url)
    }

    /// Open one pricing stream connection.
    ///
    /// Resolves once response headers arrive. A non-success status is read in
    /// full and returned as `OandaError::Api`.
    pub async fn connect<S: AsRef<str>>(
        &self,
        instruments: &[S],
        cancel: CancellationToken,
    ) -> Result<StreamReader> {
        let url = self.pricing_stream_url(instruments)?;
        info!(url = %url, "opening pricing stream");

        let pending = self.http_client.get(url.clone()).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OandaError::Cancelled),
            response = pending => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(OandaError::Cancelled),
                body = response.bytes() => body?,
            };
            let message = api_error_message(&body);
            warn!(url = %url, status = status.as_u16(), %message, "pricing stream rejected");
            return Err(OandaError::api_error(status, message));
        }

        Ok(StreamReader::from_response(response, cancel))
    }
}

impl OandaClient {
    /// Stream client sharing this client's context and connect timeout
    pub fn stream_client(&self) -> Result<OandaStreamClient> {
        OandaStreamClient::with_config(self.context().clone(), self.config())
    }
}
