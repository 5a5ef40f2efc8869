/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public OANDA v3 adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod http;
pub mod stream;
pub mod types;

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    Context,
    DispatchResponse,
    OandaClient,
    OandaError,
    RateLimiter,
    RequestDispatcher,
    Result,
};

// Re-export commonly used types from stream
pub use stream::{
    ConnectionState,
    OandaStreamClient,
    ReconnectPolicy,
    StreamEnd,
    StreamMessage,
    StreamPipeline,
    StreamReader,
    StreamSinks,
    Tick,
    UnknownMessagePolicy,
};

// Re-export all types
pub use types::*;
