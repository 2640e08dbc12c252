// Client library for the remote flight inventory service

pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod telemetry;

// Re-export key types for convenience
pub use circuit_breaker::{BreakerConfig, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use client::{ClientConfig, Endpoints, FlightClient};
pub use error::{ConfigurationError, FlightError, TransportError};
pub use model::{BookingOutcome, FlightDetails, FlightService, RequestContext};
pub use registry::ServiceRegistry;
