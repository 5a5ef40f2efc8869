/*
[INPUT]:  Pricing stream connection settings, instruments, consumer channels
[OUTPUT]: Classified messages, normalized ticks, channel fan-out
[POS]:    Stream layer - long-lived pricing stream ingestion
[UPDATE]: When adding message kinds or changing delivery semantics
*/

pub mod client;
pub mod message;
pub mod pipeline;
pub mod reader;
pub mod tick;

pub use client::OandaStreamClient;
pub use message::{StreamMessage, classify};
pub use pipeline::{
    ConnectionState, DEFAULT_CHANNEL_CAPACITY, ReconnectPolicy, StreamEnd, StreamPipeline,
    StreamSinks, UnknownMessagePolicy, distribute,
};
pub use reader::StreamReader;
pub use tick::{Tick, normalize};
