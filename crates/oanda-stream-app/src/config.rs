/*
[INPUT]:  Optional YAML configuration file, OANDA_* environment variables
[OUTPUT]: Parsed application configuration and adapter Context
[POS]:    Configuration layer - endpoint, credential and stream setup
[UPDATE]: When adding new configuration options
*/

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use config::{Config, Environment as EnvSource, File, FileFormat};
use oanda_adapter::{Context, Environment, ReconnectPolicy};
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix shared by every environment variable the app reads
pub const ENV_PREFIX: &str = "OANDA";

/// Top-level configuration for the stream demo
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    /// Hosted environment used when URLs are not given explicitly
    #[serde(default)]
    pub environment: Option<Environment>,
    /// REST base URL (`OANDA_API_URL`)
    #[serde(default)]
    pub api_url: String,
    /// Streaming base URL (`OANDA_STREAM_URL`)
    #[serde(default)]
    pub stream_url: String,
    /// Bearer token (`OANDA_API_KEY`)
    #[serde(default)]
    pub api_key: String,
    /// Account id (`OANDA_ACCOUNT`); the first account is used when empty
    #[serde(default)]
    pub account: String,
    #[serde(default = "default_application")]
    pub application: String,
    /// Minimum spacing between REST requests (`OANDA_RATE_LIMIT_MS`)
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    /// YAML list, or comma-separated in `OANDA_INSTRUMENTS`
    #[serde(default = "default_instruments", deserialize_with = "instrument_list")]
    pub instruments: Vec<String>,
    /// Reconnect attempts after the stream drops; 0 disables reconnecting
    #[serde(default)]
    pub reconnect_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: None,
            api_url: String::new(),
            stream_url: String::new(),
            api_key: String::new(),
            account: String::new(),
            application: default_application(),
            rate_limit_ms: default_rate_limit_ms(),
            instruments: default_instruments(),
            reconnect_retries: 0,
        }
    }
}

fn default_application() -> String {
    "oanda-stream-app".to_string()
}

fn default_rate_limit_ms() -> u64 {
    1
}

fn default_instruments() -> Vec<String> {
    ["EUR_USD", "BCO_USD", "SPX500_USD", "EUR_JPY"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn instrument_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Instruments {
        Csv(String),
        List(Vec<String>),
    }

    Ok(match Instruments::deserialize(deserializer)? {
        Instruments::Csv(csv) => csv.split(',').map(|item| item.trim().to_string()).collect(),
        Instruments::List(list) => list,
    })
}

impl AppConfig {
    /// Load from an optional YAML file, overridden by `OANDA_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Same as `load`, reading variables from `env` instead of the process
    /// environment when given
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }
        builder = builder.add_source(
            EnvSource::with_prefix(ENV_PREFIX).source(env),
        );

        let config: Self = builder
            .build()
            .context("read configuration sources")?
            .try_deserialize()
            .context("parse configuration")?;
        Ok(config)
    }

    /// Fail early on settings the stream cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.instruments.iter().all(|instrument| instrument.trim().is_empty()) {
            bail!("at least one instrument must be configured");
        }
        if self.environment.is_none() && self.api_url.is_empty() != self.stream_url.is_empty() {
            bail!("api_url and stream_url must be set together, or set environment");
        }
        Ok(())
    }

    /// Adapter context; missing URLs come from `environment` (practice by default)
    pub fn to_context(&self) -> Context {
        let environment = self.environment.unwrap_or(Environment::Practice);
        let api_url = if self.api_url.is_empty() {
            environment.api_url().to_string()
        } else {
            self.api_url.clone()
        };
        let stream_url = if self.stream_url.is_empty() {
            environment.stream_url().to_string()
        } else {
            self.stream_url.clone()
        };

        Context {
            api_url,
            stream_url,
            token: self.api_key.clone(),
            account: self.account.clone(),
            application: self.application.clone(),
        }
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        if self.reconnect_retries == 0 {
            ReconnectPolicy::Never
        } else {
            ReconnectPolicy::exponential(self.reconnect_retries)
        }
    }
}
