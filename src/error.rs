// Error types shared by the flight client, its breaker and the startup path

use thiserror::Error;

// Per-call errors returned by every `FlightService` operation
#[derive(Error, Debug)]
pub enum FlightError {
    #[error("Circuit breaker open for {service}")]
    Unavailable {
        service: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl FlightError {
    /// Whether retrying the same call later may succeed without a fix on the
    /// remote side.
    pub fn is_retryable(&self) -> bool {
        match self {
            FlightError::Unavailable { .. } | FlightError::Transport(_) => true,
            FlightError::Protocol(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            FlightError::Transport(TransportError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("service responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request cancelled by caller")]
    Cancelled,

    #[error("caller deadline exceeded")]
    DeadlineExceeded,
}

impl TransportError {
    /// Caller-side aborts say nothing about the health of the remote service.
    pub fn is_caller_abort(&self) -> bool {
        matches!(self, TransportError::Cancelled | TransportError::DeadlineExceeded)
    }
}

// Startup errors: fatal for the process, never produced per call
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid endpoint {address:?}: {reason}")]
    InvalidEndpoint { address: String, reason: String },

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("HTTP client initialization failed: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Logger initialization failed: {0}")]
    Logger(String),

    #[error("Flight service not registered")]
    ServiceNotRegistered,
}
