/*
[INPUT]:  AppConfig, output mode, shutdown token
[OUTPUT]: Printed ticks/prices/heartbeats until the stream ends or shutdown fires
[POS]:    Application layer - wires the REST client, pricing stream and consumers
[UPDATE]: When changing startup flow, consumer tasks, or shutdown ordering
*/

use anyhow::{Context as _, Result, anyhow};
use oanda_adapter::stream::DEFAULT_CHANNEL_CAPACITY;
use oanda_adapter::{
    ClientConfig, ClientPrice, ConnectionState, OandaClient, PricingHeartbeat, Prices, StreamEnd,
    StreamPipeline, StreamSinks, Tick,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Which price representation the printers receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Ticks,
    RawPrices,
}

/// Consumer tasks; each resolves to the number of messages it handled
#[derive(Debug)]
pub struct Consumers {
    handles: Vec<(&'static str, JoinHandle<u64>)>,
}

impl Consumers {
    /// Wait for every consumer to drain its channel
    pub async fn join(self) -> Result<Vec<(&'static str, u64)>> {
        let mut counts = Vec::with_capacity(self.handles.len());
        for (name, handle) in self.handles {
            let count = handle
                .await
                .with_context(|| format!("{name} consumer task"))?;
            info!(consumer = name, messages = count, "consumer finished");
            counts.push((name, count));
        }
        Ok(counts)
    }
}

/// Build a REST client from the configuration
pub fn build_client(config: &AppConfig) -> Result<OandaClient> {
    let client_config = ClientConfig {
        min_request_interval: config.min_request_interval(),
        ..ClientConfig::default()
    };
    OandaClient::with_config(config.to_context(), client_config).context("create REST client")
}

/// Bind the client to the first account when none is configured
pub async fn resolve_account(client: OandaClient) -> Result<OandaClient> {
    if client.context().has_account() {
        return Ok(client);
    }

    let accounts = client.get_accounts().await.context("list accounts")?;
    let first = accounts
        .accounts
        .first()
        .ok_or_else(|| anyhow!("no account configured and none available for this token"))?;
    info!(account = %first.id, "using first available account");
    Ok(client.with_account(first.id.clone()))
}

/// Fetch and log one pricing snapshot
pub async fn log_snapshot(client: &OandaClient, instruments: &[String]) -> Result<Prices> {
    let instruments: Vec<&str> = instruments.iter().map(String::as_str).collect();
    let prices = client
        .get_pricing(&instruments)
        .await
        .context("fetch pricing snapshot")?;

    for price in &prices.prices {
        match Tick::try_from(price) {
            Ok(tick) => info!(%tick, "snapshot"),
            Err(err) => warn!(instrument = %price.instrument, error = %err, "snapshot price has no two-sided market"),
        }
    }
    Ok(prices)
}

/// Create the channels for `mode` and start one printer per channel
pub fn spawn_printers(mode: OutputMode) -> (StreamSinks, Consumers) {
    let (hb_tx, hb_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let mut handles = vec![("heartbeats", tokio::spawn(print_heartbeats(hb_rx)))];
    let sinks = StreamSinks::new().with_heartbeats(hb_tx);

    let sinks = match mode {
        OutputMode::Ticks => {
            let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
            handles.push(("ticks", tokio::spawn(print_ticks(rx))));
            sinks.with_ticks(tx)
        }
        OutputMode::RawPrices => {
            let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
            handles.push(("prices", tokio::spawn(print_prices(rx))));
            sinks.with_prices(tx)
        }
    };

    (sinks, Consumers { handles })
}

async fn print_ticks(mut rx: mpsc::Receiver<Tick>) -> u64 {
    let mut count = 0;
    while let Some(tick) = rx.recv().await {
        println!("{tick}");
        count += 1;
    }
    count
}

async fn print_prices(mut rx: mpsc::Receiver<ClientPrice>) -> u64 {
    let mut count = 0;
    while let Some(price) = rx.recv().await {
        match Tick::try_from(&price) {
            Ok(tick) => println!("{tick}"),
            Err(_) => println!(
                "{} {} bids={} asks={} tradeable={}",
                price.instrument,
                price.time.to_rfc3339(),
                price.bids.len(),
                price.asks.len(),
                price.tradeable
            ),
        }
        count += 1;
    }
    count
}

async fn print_heartbeats(mut rx: mpsc::Receiver<PricingHeartbeat>) -> u64 {
    let mut count = 0;
    while let Some(heartbeat) = rx.recv().await {
        println!("heartbeat {}", heartbeat.time.to_rfc3339());
        count += 1;
    }
    count
}

fn spawn_state_logger(mut state: watch::Receiver<ConnectionState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            match current {
                ConnectionState::Reconnecting { attempt, delay } => {
                    warn!(attempt, ?delay, "pricing stream reconnecting")
                }
                other => info!(state = ?other, "pricing stream state"),
            }
        }
    })
}

/// Full demo flow: resolve account, log a snapshot, stream until shutdown.
///
/// Consumers are drained before returning, so every delivered message has
/// been printed.
pub async fn run(config: &AppConfig, mode: OutputMode, shutdown: CancellationToken) -> Result<StreamEnd> {
    config.validate()?;

    let client = resolve_account(build_client(config)?).await?;
    info!(
        api_url = %client.context().api_url,
        stream_url = %client.context().stream_url,
        account = %client.context().account,
        application = %client.context().application,
        "client ready"
    );

    if let Err(err) = log_snapshot(&client, &config.instruments).await {
        warn!(error = %err, "pricing snapshot failed; continuing with stream");
    }

    let pipeline = StreamPipeline::new(client.stream_client()?, config.instruments.as_slice())
        .reconnect(config.reconnect_policy())
        .with_cancellation(shutdown);
    let state_logger = spawn_state_logger(pipeline.subscribe_connection_state());

    let (sinks, consumers) = spawn_printers(mode);
    let outcome = pipeline.spawn(sinks).await.context("pricing stream task")?;

    consumers.join().await?;
    state_logger.await.context("state logger task")?;

    let end = outcome.context("pricing stream")?;
    info!(?end, "pricing stream finished");
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oanda_adapter::Context;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, account: &str) -> OandaClient {
        let context = Context {
            api_url: server.uri(),
            stream_url: server.uri(),
            token: "t".to_string(),
            account: account.to_string(),
            application: String::new(),
        };
        OandaClient::new(context).unwrap()
    }

    #[tokio::test]
    async fn configured_account_skips_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/accounts"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let resolved = resolve_account(client(&server, "101-1")).await.unwrap();
        assert_eq!(resolved.context().account, "101-1");
    }

    #[tokio::test]
    async fn missing_account_uses_first_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accounts": [{"id": "101-2", "tags": []}, {"id": "101-3", "tags": []}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resolved = resolve_account(client(&server, "")).await.unwrap();
        assert_eq!(resolved.context().account, "101-2");
    }

    #[tokio::test]
    async fn no_accounts_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accounts": []
            })))
            .mount(&server)
            .await;

        assert!(resolve_account(client(&server, "")).await.is_err());
    }

    #[tokio::test]
    async fn printers_count_until_channels_close() {
        let (sinks, consumers) = spawn_printers(OutputMode::Ticks);
        assert!(sinks.prices.is_none());

        let heartbeat = PricingHeartbeat {
            time: "2024-01-01T00:00:00Z".parse().unwrap(),
        };
        let heartbeats = sinks.heartbeats.clone().unwrap();
        heartbeats.send(heartbeat.clone()).await.unwrap();
        heartbeats.send(heartbeat).await.unwrap();
        drop(heartbeats);
        drop(sinks);

        let counts = consumers.join().await.unwrap();
        assert_eq!(counts, vec![("heartbeats", 2u64), ("ticks", 0u64)]);
    }
}
