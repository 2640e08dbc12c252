use parking_lot::Mutex;
use std::{
    fmt,
    future::Future,
    time::{Duration, Instant},
};
use thiserror::Error;

const DEFAULT_FAILURE_THRESHOLD: u32 = 10;
const DEFAULT_SUCCESS_THRESHOLD: u32 = 5;
const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(30);
const DEFAULT_HALF_OPEN_MAX_CALLS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cool_down: Duration,
    /// Trial calls allowed in flight at once while half-open.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            cool_down: DEFAULT_COOL_DOWN,
            half_open_max_calls: DEFAULT_HALF_OPEN_MAX_CALLS,
        }
    }
}

impl BreakerConfig {
    /// Replaces zero values with the defaults.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            failure_threshold: non_zero_or(self.failure_threshold, defaults.failure_threshold),
            success_threshold: non_zero_or(self.success_threshold, defaults.success_threshold),
            cool_down: if self.cool_down.is_zero() {
                defaults.cool_down
            } else {
                self.cool_down
            },
            half_open_max_calls: non_zero_or(
                self.half_open_max_calls,
                defaults.half_open_max_calls,
            ),
        }
    }
}

fn non_zero_or(value: u32, default: u32) -> u32 {
    if value == 0 {
        default
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub in_flight_trials: u32,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("circuit breaker rejected the call")]
pub struct Rejected {
    /// Remaining cool-down, `None` when rejected for lack of half-open trial slots.
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
pub enum BreakerError<E> {
    Rejected(Rejected),
    Inner(E),
}

/// Decides whether an error of the wrapped call is a failure of the remote side.
pub trait Tripping {
    fn trips_breaker(&self) -> bool {
        true
    }
}

enum State {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { successes: u32, in_flight: u32 },
}

impl State {
    fn kind(&self) -> BreakerState {
        match self {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }
}

struct Inner {
    state: State,
    // bumped on every transition so late outcomes from an older state are dropped
    generation: u64,
}

impl Inner {
    fn transition(&mut self, next: State) {
        tracing::info!(
            from = ?self.state.kind(),
            to = ?next.kind(),
            "circuit breaker transition"
        );
        self.state = next;
        self.generation += 1;
    }
}

fn open_now() -> State {
    State::Open {
        opened_at: Instant::now(),
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Success,
    Failure,
    Released,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config: config.normalized(),
            inner: Mutex::new(Inner {
                state: State::Closed { failures: 0 },
                generation: 0,
            }),
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state.kind()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == BreakerState::Closed
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        let (consecutive_failures, consecutive_successes, in_flight_trials) = match inner.state {
            State::Closed { failures } => (failures, 0, 0),
            State::Open { .. } => (0, 0, 0),
            State::HalfOpen {
                successes,
                in_flight,
            } => (0, successes, in_flight),
        };
        BreakerSnapshot {
            state: inner.state.kind(),
            consecutive_failures,
            consecutive_successes,
            in_flight_trials,
        }
    }

    /// Admits one call or rejects it. An elapsed cool-down moves Open to HalfOpen here.
    pub fn try_acquire(&self) -> Result<Permit<'_>, Rejected> {
        let mut inner = self.inner.lock();

        if let State::Open { opened_at } = inner.state {
            let elapsed = opened_at.elapsed();
            if elapsed < self.config.cool_down {
                return Err(Rejected {
                    retry_after: Some(self.config.cool_down - elapsed),
                });
            }
            inner.transition(State::HalfOpen {
                successes: 0,
                in_flight: 0,
            });
        }

        let generation = inner.generation;
        let trial = match &mut inner.state {
            State::HalfOpen { in_flight, .. } => {
                if *in_flight >= self.config.half_open_max_calls {
                    return Err(Rejected { retry_after: None });
                }
                *in_flight += 1;
                true
            }
            _ => false,
        };

        Ok(Permit {
            breaker: self,
            generation,
            trial,
            settled: false,
        })
    }

    /// Runs `work` if the breaker admits it and feeds its result back.
    /// `work` is never polled when the call is rejected.
    pub async fn call<F, T, E>(&self, work: F) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: Tripping,
    {
        let permit = self.try_acquire().map_err(BreakerError::Rejected)?;
        match work.await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) => {
                if err.trips_breaker() {
                    permit.failure();
                }
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Forces the breaker back to Closed with cleared counters.
    pub fn reset(&self) {
        self.inner
            .lock()
            .transition(State::Closed { failures: 0 });
    }

    fn record(&self, generation: u64, trial: bool, outcome: Outcome) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }

        let next = match &mut inner.state {
            State::Closed { failures } => match outcome {
                Outcome::Success => {
                    *failures = 0;
                    None
                }
                Outcome::Failure => {
                    *failures += 1;
                    if *failures >= self.config.failure_threshold {
                        tracing::warn!(failures = *failures, "failure threshold reached");
                        Some(open_now())
                    } else {
                        None
                    }
                }
                Outcome::Released => None,
            },
            State::HalfOpen {
                successes,
                in_flight,
            } => {
                if trial {
                    *in_flight = in_flight.saturating_sub(1);
                }
                match outcome {
                    Outcome::Success => {
                        *successes += 1;
                        (*successes >= self.config.success_threshold)
                            .then_some(State::Closed { failures: 0 })
                    }
                    Outcome::Failure => Some(open_now()),
                    Outcome::Released => None,
                }
            }
            State::Open { .. } => None,
        };

        if let Some(next) = next {
            inner.transition(next);
        }
    }
}

/// Admission ticket for one call. Dropping it without reporting an outcome
/// frees its half-open trial slot and leaves the counters untouched.
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    pub fn success(mut self) {
        self.settle(Outcome::Success);
    }

    pub fn failure(mut self) {
        self.settle(Outcome::Failure);
    }

    fn settle(&mut self, outcome: Outcome) {
        if !self.settled {
            self.settled = true;
            self.breaker.record(self.generation, self.trial, outcome);
        }
    }
}

impl fmt::Debug for Permit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("generation", &self.generation)
            .field("trial", &self.trial)
            .finish()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.settle(Outcome::Released);
    }
}
