// HTTP adapter for the remote flight inventory service.
// Every call goes through the circuit breaker; only call-level failures
// (connection errors, client timeouts, non-2xx statuses) are reported to it.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::{
    circuit_breaker::{BreakerConfig, BreakerError, CircuitBreaker, Tripping},
    error::{ConfigurationError, FlightError, TransportError},
    model::{BookingOutcome, FlightDetails, FlightService, RequestContext},
};

pub const SERVICE_NAME: &str = "flight-inventory";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 10;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Overrides `base_url` for seat bookings.
    pub book_seat_url: Option<String>,
    /// Overrides `base_url` for flight detail lookups.
    pub flight_details_url: Option<String>,
    pub timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub max_idle_connections: usize,
    pub circuit_breaker_config: BreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            book_seat_url: None,
            flight_details_url: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            circuit_breaker_config: BreakerConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(if self.timeout_ms == 0 {
            DEFAULT_TIMEOUT_MS
        } else {
            self.timeout_ms
        })
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_millis(if self.idle_timeout_ms == 0 {
            DEFAULT_TIMEOUT_MS
        } else {
            self.idle_timeout_ms
        })
    }

    fn max_idle_connections(&self) -> usize {
        if self.max_idle_connections == 0 {
            DEFAULT_MAX_IDLE_CONNECTIONS
        } else {
            self.max_idle_connections
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub book_seat: Url,
    pub flight_details: Url,
}

impl Endpoints {
    pub fn resolve(config: &ClientConfig) -> Result<Self, ConfigurationError> {
        let book_seat = config.book_seat_url.as_deref().unwrap_or(&config.base_url);
        let flight_details = config
            .flight_details_url
            .as_deref()
            .unwrap_or(&config.base_url);
        Ok(Self {
            book_seat: parse_endpoint(book_seat)?,
            flight_details: parse_endpoint(flight_details)?,
        })
    }
}

fn parse_endpoint(address: &str) -> Result<Url, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidEndpoint {
        address: address.to_string(),
        reason,
    };
    let url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}

// Wire types
#[derive(Debug, Serialize)]
struct BookSeatRequest {
    flight_id: i64,
    seat_id: i64,
}

#[derive(Debug, Deserialize)]
struct BookSeatResponse {
    status: i64,
}

#[derive(Debug, Serialize)]
struct FlightDetailsRequest {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct FlightDetailsResponse {
    src: String,
    dest: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    cost: Option<i64>,
}

impl From<FlightDetailsResponse> for FlightDetails {
    fn from(resp: FlightDetailsResponse) -> Self {
        Self {
            origin: resp.src,
            destination: resp.dest,
            description: resp.desc.unwrap_or_default(),
            cost: resp.cost.unwrap_or_default(),
        }
    }
}

impl Tripping for TransportError {
    fn trips_breaker(&self) -> bool {
        !self.is_caller_abort()
    }
}

pub struct FlightClient {
    endpoints: Endpoints,
    http: reqwest::Client,
    breaker: CircuitBreaker,
}

impl FlightClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigurationError> {
        let endpoints = Endpoints::resolve(&config)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_idle_timeout(config.idle_timeout())
            .pool_max_idle_per_host(config.max_idle_connections())
            .build()
            .map_err(ConfigurationError::HttpClient)?;

        tracing::debug!(
            book_seat = %endpoints.book_seat,
            flight_details = %endpoints.flight_details,
            "flight client initialized"
        );

        Ok(Self {
            endpoints,
            http,
            breaker: CircuitBreaker::new(config.circuit_breaker_config),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn reset_breaker(&self) {
        self.breaker.reset();
    }

    // Serialize, send through the breaker, decode. Decode errors never reach the breaker.
    async fn post_json<Req, Resp>(
        &self,
        ctx: &RequestContext,
        url: &Url,
        payload: &Req,
    ) -> Result<Resp, FlightError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = self
            .breaker
            .call(self.send(ctx, url, payload))
            .await
            .map_err(|err| match err {
                BreakerError::Rejected(rejected) => {
                    tracing::warn!(retry_after = ?rejected.retry_after, "call rejected by circuit breaker");
                    FlightError::Unavailable {
                        service: SERVICE_NAME.to_string(),
                        retry_after_ms: rejected
                            .retry_after
                            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                    }
                }
                BreakerError::Inner(err) => {
                    tracing::warn!(error = %err, "flight service call failed");
                    FlightError::Transport(err)
                }
            })?;

        serde_json::from_slice(&body).map_err(|e| {
            FlightError::Protocol(format!(
                "undecodable response from {url}: {e}"
            ))
        })
    }

    // The unit of work guarded by the breaker; races the caller's cancellation and deadline.
    async fn send<Req>(
        &self,
        ctx: &RequestContext,
        url: &Url,
        payload: &Req,
    ) -> Result<Bytes, TransportError>
    where
        Req: Serialize + Sync,
    {
        let deadline = async {
            match ctx.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(TransportError::Cancelled),
            _ = deadline => Err(TransportError::DeadlineExceeded),
            res = self.execute(url, payload) => res,
        }
    }

    async fn execute<Req>(&self, url: &Url, payload: &Req) -> Result<Bytes, TransportError>
    where
        Req: Serialize + Sync,
    {
        let response = self.http.post(url.clone()).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl FlightService for FlightClient {
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    async fn book_seat(
        &self,
        ctx: &RequestContext,
        flight_id: i64,
        seat_id: i64,
    ) -> Result<BookingOutcome, FlightError> {
        let request = BookSeatRequest { flight_id, seat_id };
        let response: BookSeatResponse = self
            .post_json(ctx, &self.endpoints.book_seat, &request)
            .await?;
        let outcome = BookingOutcome::try_from(response.status)?;
        tracing::debug!(?outcome, "seat booking answered");
        Ok(outcome)
    }

    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    async fn get_flight_details(
        &self,
        ctx: &RequestContext,
        flight_id: i64,
    ) -> Result<FlightDetails, FlightError> {
        let request = FlightDetailsRequest { id: flight_id };
        let response: FlightDetailsResponse = self
            .post_json(ctx, &self.endpoints.flight_details, &request)
            .await?;
        tracing::debug!("flight details answered");
        Ok(response.into())
    }
}
