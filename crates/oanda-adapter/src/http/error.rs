/*
[INPUT]:  Error sources (URL parsing, transport, API status, stream decoding)
[OUTPUT]: Structured error types with classification helpers
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the OANDA adapter
#[derive(Error, Debug)]
pub enum OandaError {
    /// Caller supplied an unusable URL, header or parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Connection, timeout, DNS or body read failure
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Stream body read failure
    #[error("Stream read failure: {0}")]
    Io(#[from] std::io::Error),

    /// API returned a non-success status
    #[error("API error (code {code}): {message}")]
    Api { code: i32, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stream line or price message is structurally invalid
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Stream line carried a `type` value this client does not know
    #[error("Unrecognized stream message type: {0}")]
    UnknownMessageType(String),

    /// Operation aborted by a cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OandaError {
    /// Check if the error is worth retrying by the caller
    pub fn is_retryable(&self) -> bool {
        match self {
            OandaError::Transport(_) | OandaError::Io(_) => true,
            OandaError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Check if the error stems from an undecodable or invalid message
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            OandaError::Malformed(_)
                | OandaError::UnknownMessageType(_)
                | OandaError::Serialization(_)
        )
    }

    /// Check if the error is a connection, timeout or read failure
    pub fn is_transport(&self) -> bool {
        matches!(self, OandaError::Transport(_) | OandaError::Io(_))
    }

    /// Check if the error stems from bad caller input
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, OandaError::InvalidInput(_) | OandaError::UrlParse(_))
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        OandaError::Api {
            code: status.as_u16() as i32,
            message: message.into(),
        }
    }
}

/// Result type alias for OANDA operations
pub type Result<T> = std::result::Result<T, OandaError>;
