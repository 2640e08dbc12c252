// Domain model shared between the flight client and its callers

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::FlightError;

// Seat booking outcome as reported by the inventory service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingOutcome {
    Confirmed = 1,
    Failed = 2,
    InProcess = 3,
}

impl BookingOutcome {
    pub fn code(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for BookingOutcome {
    type Error = FlightError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(BookingOutcome::Confirmed),
            2 => Ok(BookingOutcome::Failed),
            3 => Ok(BookingOutcome::InProcess),
            other => Err(FlightError::Protocol(format!(
                "unknown booking status {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightDetails {
    pub origin: String,
    pub destination: String,
    /// Empty when the service sent no description.
    pub description: String,
    /// Zero when the service sent no cost.
    pub cost: i64,
}

impl FlightDetails {
    pub fn description_opt(&self) -> Option<&str> {
        if self.description.is_empty() {
            None
        } else {
            Some(&self.description)
        }
    }

    pub fn cost_opt(&self) -> Option<i64> {
        (self.cost != 0).then_some(self.cost)
    }
}

/// Per-call context: correlation id for diagnostics, an optional deadline and
/// a cancellation signal the caller can trigger at any time.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub correlation_id: String,
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

// Operations any flight inventory transport has to provide
#[async_trait]
pub trait FlightService: Send + Sync + 'static {
    async fn book_seat(
        &self,
        ctx: &RequestContext,
        flight_id: i64,
        seat_id: i64,
    ) -> Result<BookingOutcome, FlightError>;

    async fn get_flight_details(
        &self,
        ctx: &RequestContext,
        flight_id: i64,
    ) -> Result<FlightDetails, FlightError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_outcome_codes() {
        for (code, outcome) in [
            (1, BookingOutcome::Confirmed),
            (2, BookingOutcome::Failed),
            (3, BookingOutcome::InProcess),
        ] {
            assert_eq!(BookingOutcome::try_from(code).unwrap(), outcome);
            assert_eq!(outcome.code(), code);
        }
    }

    #[test]
    fn test_unknown_booking_status_is_protocol_error() {
        for code in [0, 4, -1, 200] {
            match BookingOutcome::try_from(code) {
                Err(FlightError::Protocol(msg)) => assert!(msg.contains(&code.to_string())),
                other => panic!("expected protocol error for {code}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_flight_details_optional_fields() {
        let details = FlightDetails {
            origin: "Delhi".to_string(),
            destination: "Mumbai".to_string(),
            ..Default::default()
        };
        assert_eq!(details.description_opt(), None);
        assert_eq!(details.cost_opt(), None);

        let details = FlightDetails {
            description: "non-stop".to_string(),
            cost: 10000,
            ..details
        };
        assert_eq!(details.description_opt(), Some("non-stop"));
        assert_eq!(details.cost_opt(), Some(10000));
    }

    #[tokio::test]
    async fn test_request_context_deadline() {
        let ctx = RequestContext::new("abc").with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.correlation_id, "abc");
        assert!(ctx.deadline.unwrap() > Instant::now());
        assert!(!ctx.cancel.is_cancelled());
    }
}
