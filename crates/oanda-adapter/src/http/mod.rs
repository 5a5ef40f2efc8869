/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod account;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod pricing;
pub mod rate_limit;
pub mod trade;

pub use error::{OandaError, Result};

pub use client::{ClientConfig, Context, OandaClient};
pub use dispatcher::{DispatchResponse, RequestDispatcher, RequestTemplate};
pub use pricing::CandlesRequest;
pub use rate_limit::{DEFAULT_MIN_INTERVAL, RateLimiter};
