//! Connection lifecycle as an explicit, socket-free state machine.
//!
//! The WebSocket task feeds observed events in and executes the returned
//! actions; all reconnect policy (backoff, attempt counting, planned-close
//! handling, fallback escalation) lives here where it can be tested without
//! a transport.

use crate::domain::market::types::ConnectionState;
use std::time::Duration;
use tracing::{info, warn};

/// Exponential reconnect backoff: `min(base * 2^attempts, cap)`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub cap_ms: u64,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: 1000,
            cap_ms: 30_000,
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 1u64 << attempts.min(20);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.cap_ms))
    }
}

/// Observed transport events.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// External request to (re)establish the session; resets attempts.
    ConnectRequested,
    /// The socket opened successfully.
    Opened,
    /// The socket closed with a non-normal code, errored, or failed to dial.
    ClosedAbnormally { reason: String },
    /// A normal-code close: either self-initiated ahead of the provider's
    /// session cap or a graceful server close.
    ClosedPlanned,
    /// A scheduled retry delay has elapsed.
    RetryElapsed,
}

/// What the transport task must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorAction {
    /// Dial the endpoint now.
    Connect,
    /// Wait, then feed back `RetryElapsed`.
    RetryAfter(Duration),
    /// Reconnect attempts exhausted: stop the session task and leave price
    /// delivery to the REST fallback until the next `ConnectRequested`.
    EnterFallback,
    None,
}

pub struct ConnectionSupervisor {
    state: ConnectionState,
    attempts: u32,
    backoff: BackoffPolicy,
    planned_delay: Duration,
}

impl ConnectionSupervisor {
    pub fn new(backoff: BackoffPolicy, planned_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            backoff,
            planned_delay,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_event(&mut self, event: StreamEvent) -> SupervisorAction {
        match event {
            StreamEvent::ConnectRequested => {
                self.attempts = 0;
                self.state = ConnectionState::Connecting;
                SupervisorAction::Connect
            }
            StreamEvent::Opened => {
                if self.state != ConnectionState::Connected {
                    info!("ConnectionSupervisor: {} → CONNECTED", self.state);
                }
                self.state = ConnectionState::Connected;
                self.attempts = 0;
                SupervisorAction::None
            }
            StreamEvent::ClosedPlanned => {
                // Planned closes do not count against the attempt budget and
                // reconnect after a short fixed delay; the session stays
                // logically connected.
                info!(
                    "ConnectionSupervisor: planned close, re-dialing in {:?}",
                    self.planned_delay
                );
                SupervisorAction::RetryAfter(self.planned_delay)
            }
            StreamEvent::ClosedAbnormally { reason } => {
                if self.attempts < self.backoff.max_attempts {
                    self.attempts += 1;
                    self.state = ConnectionState::Reconnecting;
                    let delay = self.backoff.delay_for(self.attempts);
                    warn!(
                        "ConnectionSupervisor: abnormal close ({}), attempt {}/{} in {:?}",
                        reason, self.attempts, self.backoff.max_attempts, delay
                    );
                    SupervisorAction::RetryAfter(delay)
                } else {
                    self.state = ConnectionState::FailedFallback;
                    warn!(
                        "ConnectionSupervisor: abnormal close ({}) after {} attempts → FAILED_FALLBACK",
                        reason, self.attempts
                    );
                    SupervisorAction::EnterFallback
                }
            }
            StreamEvent::RetryElapsed => match self.state {
                ConnectionState::Reconnecting
                | ConnectionState::Connected
                | ConnectionState::Connecting => {
                    self.state = ConnectionState::Connecting;
                    SupervisorAction::Connect
                }
                _ => SupervisorAction::None,
            },
        }
    }
}
