/*
[INPUT]:  StreamReader lines, consumer channels, unknown-type and reconnect policies
[OUTPUT]: Prices, ticks and heartbeats delivered in receive order; StreamEnd outcome
[POS]:    Stream layer - classification, normalization and channel fan-out
[UPDATE]: When changing routing, reconnection backoff, or shutdown semantics
*/

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{OandaError, Result};
use crate::stream::client::OandaStreamClient;
use crate::stream::message::{StreamMessage, classify};
use crate::stream::reader::StreamReader;
use crate::stream::tick::{Tick, normalize};
use crate::types::{ClientPrice, PricingHeartbeat};

/// Channel capacity giving the closest thing to a rendezvous channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

const MESSAGE_SAMPLE_LIMIT: usize = 5;
const UNKNOWN_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 512;

static MESSAGE_SAMPLE_COUNT: AtomicUsize = AtomicUsize::new(0);
static UNKNOWN_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// What to do with a line whose `type` is not recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownMessagePolicy {
    /// Log (sampled) and keep reading
    #[default]
    Skip,
    /// End the stream with `UnknownMessageType`
    Fail,
}

/// Whether and how to reopen the stream after it ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    #[default]
    Never,
    /// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max`
    Backoff {
        max_retries: u32,
        base: Duration,
        max: Duration,
    },
}

impl ReconnectPolicy {
    /// Backoff starting at one second, capped at 30 seconds
    pub fn exponential(max_retries: u32) -> Self {
        ReconnectPolicy::Backoff {
            max_retries,
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }

    /// Delay before reconnect `attempt` (1-based), or `None` to give up
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Backoff {
                max_retries,
                base,
                max,
            } => {
                if attempt == 0 || attempt > max_retries {
                    return None;
                }
                let factor = 1u32 << (attempt - 1).min(31);
                Some(base.saturating_mul(factor).min(max))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    Disconnected,
}

/// How a stream ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Server closed the body
    Closed,
    /// Cancellation token fired
    Cancelled,
    /// Every consumer channel was closed
    ConsumersGone,
}

/// Consumer channels, one per message kind. Unset kinds are not produced.
#[derive(Debug, Default)]
pub struct StreamSinks {
    pub prices: Option<mpsc::Sender<ClientPrice>>,
    pub ticks: Option<mpsc::Sender<Tick>>,
    pub heartbeats: Option<mpsc::Sender<PricingHeartbeat>>,
}

impl StreamSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(mut self, tx: mpsc::Sender<ClientPrice>) -> Self {
        self.prices = Some(tx);
        self
    }

    pub fn with_ticks(mut self, tx: mpsc::Sender<Tick>) -> Self {
        self.ticks = Some(tx);
        self
    }

    pub fn with_heartbeats(mut self, tx: mpsc::Sender<PricingHeartbeat>) -> Self {
        self.heartbeats = Some(tx);
        self
    }

    /// True once no consumer remains
    pub fn is_empty(&self) -> bool {
        self.prices.is_none() && self.ticks.is_none() && self.heartbeats.is_none()
    }
}

enum Delivery {
    Sent,
    Dropped,
    Cancelled,
}

/// Classify every line of `reader` and push it to the matching sink.
///
/// Sends wait for channel capacity, so a slow consumer throttles reading.
/// A consumer that closes its receiver is dropped from `sinks`; the others
/// keep receiving. Decoding and normalization failures end the stream.
pub async fn distribute(
    reader: &mut StreamReader,
    sinks: &mut StreamSinks,
    unknown_messages: UnknownMessagePolicy,
) -> Result<StreamEnd> {
    let cancel = reader.cancellation_token().clone();

    loop {
        if sinks.is_empty() {
            info!("all stream consumers closed");
            return Ok(StreamEnd::ConsumersGone);
        }

        let line = match reader.next_line().await {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                warn!(error = %err, lines_read = reader.lines_read(), "pricing stream read failed");
                return Err(err);
            }
            None if reader.is_cancelled() => return Ok(StreamEnd::Cancelled),
            None => return Ok(StreamEnd::Closed),
        };

        let message = match classify(&line) {
            Ok(message) => message,
            Err(OandaError::UnknownMessageType(kind))
                if unknown_messages == UnknownMessagePolicy::Skip =>
            {
                log_unknown_message(&kind, &line);
                continue;
            }
            Err(err) => {
                log_parse_failure(&err, &line);
                return Err(err);
            }
        };
        log_message_sample(&message);

        let delivery = match message {
            StreamMessage::Heartbeat(heartbeat) => {
                deliver(&mut sinks.heartbeats, heartbeat, &cancel, "heartbeats").await
            }
            StreamMessage::Price(price) => {
                let tick = match sinks.ticks {
                    Some(_) => Some(normalize(&price).inspect_err(|err| {
                        log_parse_failure(err, &line);
                    })?),
                    None => None,
                };

                let mut delivery = deliver(&mut sinks.prices, price, &cancel, "prices").await;
                if let (Some(tick), false) = (tick, matches!(delivery, Delivery::Cancelled)) {
                    delivery = deliver(&mut sinks.ticks, tick, &cancel, "ticks").await;
                }
                delivery
            }
        };

        if let Delivery::Cancelled = delivery {
            debug!("pricing stream cancelled while waiting on a consumer");
            return Ok(StreamEnd::Cancelled);
        }
    }
}

async fn deliver<T>(
    slot: &mut Option<mpsc::Sender<T>>,
    value: T,
    cancel: &CancellationToken,
    sink: &'static str,
) -> Delivery {
    let Some(tx) = slot.as_ref() else {
        return Delivery::Sent;
    };

    let sent = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = tx.send(value) => Some(result.is_ok()),
    };

    match sent {
        None => Delivery::Cancelled,
        Some(true) => Delivery::Sent,
        Some(false) => {
            warn!(sink, "stream consumer closed; no longer delivering");
            *slot = None;
            Delivery::Dropped
        }
    }
}

/// Pricing stream connection with optional reconnection.
///
/// Connection state changes are published on a `watch` channel.
#[derive(Debug)]
pub struct StreamPipeline {
    client: OandaStreamClient,
    instruments: Vec<String>,
    unknown_messages: UnknownMessagePolicy,
    reconnect: ReconnectPolicy,
    cancel: CancellationToken,
    state: watch::Sender<ConnectionState>,
}

impl StreamPipeline {
    pub fn new<S: AsRef<str>>(client: OandaStreamClient, instruments: &[S]) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Idle);
        Self {
            client,
            instruments: instruments
                .iter()
                .map(|instrument| instrument.as_ref().to_string())
                .collect(),
            unknown_messages: UnknownMessagePolicy::default(),
            reconnect: ReconnectPolicy::default(),
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn unknown_messages(mut self, policy: UnknownMessagePolicy) -> Self {
        self.unknown_messages = policy;
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Stop the pipeline when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Run until the stream ends for good.
    ///
    /// With `ReconnectPolicy::Never` the first close or failure is final.
    /// Otherwise server closes and retryable failures reconnect with backoff;
    /// the attempt counter resets once a connection has delivered a line.
    pub async fn run(&self, mut sinks: StreamSinks) -> Result<StreamEnd> {
        if sinks.is_empty() {
            return Err(OandaError::InvalidInput(
                "pricing stream needs at least one consumer".to_string(),
            ));
        }

        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.finish(StreamEnd::Cancelled));
            }

            self.state.send_replace(ConnectionState::Connecting);
            let outcome = match self.client.connect(self.instruments.as_slice(), self.cancel.clone()).await {
                Ok(mut reader) => {
                    self.state.send_replace(ConnectionState::Connected);
                    info!(instruments = ?self.instruments, "pricing stream connected");

                    let outcome = distribute(&mut reader, &mut sinks, self.unknown_messages).await;
                    if reader.lines_read() > 0 {
                        attempt = 0;
                    }
                    outcome
                }
                Err(OandaError::Cancelled) => Ok(StreamEnd::Cancelled),
                Err(err) => Err(err),
            };

            let retryable = match &outcome {
                Ok(StreamEnd::Closed) => true,
                Ok(_) => false,
                Err(err) => err.is_retryable(),
            };
            if !retryable {
                return self.conclude(outcome);
            }

            attempt += 1;
            let Some(delay) = self.reconnect.delay(attempt) else {
                if attempt > 1 {
                    warn!(attempt, "pricing stream gave up reconnecting");
                }
                return self.conclude(outcome);
            };

            match &outcome {
                Ok(end) => warn!(attempt, ?delay, ?end, "pricing stream ended; reconnecting"),
                Err(err) => warn!(attempt, ?delay, error = %err, "pricing stream failed; reconnecting"),
            }
            self.state
                .send_replace(ConnectionState::Reconnecting { attempt, delay });

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(self.finish(StreamEnd::Cancelled)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Run on a new task
    pub fn spawn(self, sinks: StreamSinks) -> JoinHandle<Result<StreamEnd>> {
        tokio::spawn(async move { self.run(sinks).await })
    }

    /// Deliver raw prices and heartbeats
    pub fn pricing_stream(
        self,
        prices: mpsc::Sender<ClientPrice>,
        heartbeats: mpsc::Sender<PricingHeartbeat>,
    ) -> JoinHandle<Result<StreamEnd>> {
        self.spawn(
            StreamSinks::new()
                .with_prices(prices)
                .with_heartbeats(heartbeats),
        )
    }

    /// Deliver normalized ticks and heartbeats
    pub fn tick_stream(
        self,
        ticks: mpsc::Sender<Tick>,
        heartbeats: mpsc::Sender<PricingHeartbeat>,
    ) -> JoinHandle<Result<StreamEnd>> {
        self.spawn(StreamSinks::new().with_ticks(ticks).with_heartbeats(heartbeats))
    }

    fn conclude(&self, outcome: Result<StreamEnd>) -> Result<StreamEnd> {
        match outcome {
            Ok(end) => Ok(self.finish(end)),
            Err(err) => {
                warn!(error = %err, "pricing stream stopped");
                self.state.send_replace(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    fn finish(&self, end: StreamEnd) -> StreamEnd {
        info!(?end, "pricing stream stopped");
        self.state.send_replace(ConnectionState::Disconnected);
        end
    }
}

fn log_message_sample(message: &StreamMessage) {
    let count = MESSAGE_SAMPLE_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= MESSAGE_SAMPLE_LIMIT {
        return;
    }

    match message {
        StreamMessage::Heartbeat(heartbeat) => debug!(
            sample_index = count + 1,
            sample_limit = MESSAGE_SAMPLE_LIMIT,
            time = %heartbeat.time,
            "stream heartbeat"
        ),
        StreamMessage::Price(price) => debug!(
            sample_index = count + 1,
            sample_limit = MESSAGE_SAMPLE_LIMIT,
            instrument = %price.instrument,
            bids = price.bids.len(),
            asks = price.asks.len(),
            "stream price"
        ),
    }
}

fn log_unknown_message(kind: &str, raw: &str) {
    let count = UNKNOWN_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < UNKNOWN_LOG_LIMIT {
        warn!(
            sample_index = count + 1,
            sample_limit = UNKNOWN_LOG_LIMIT,
            kind,
            bytes = raw.len(),
            "skipping stream message with unknown type"
        );
        debug!(
            sample_index = count + 1,
            message = %truncate_for_log(raw, RAW_LOG_MAX_BYTES),
            "skipped stream message"
        );
    }
}

fn log_parse_failure(err: &OandaError, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        warn!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            message = %truncate_for_log(raw, RAW_LOG_MAX_BYTES),
            "stream message rejected"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}
