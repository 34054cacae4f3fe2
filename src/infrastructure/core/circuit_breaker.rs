use anyhow::Result;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Breaker phases: requests pass in `Closed`, are rejected in `Open`, and
/// probe the dependency in `HalfOpen` after the cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerPhase {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    phase: BreakerPhase,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

/// Guards a REST dependency against hammering a failing endpoint.
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    success_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(
        name: &'static str,
        failure_threshold: u32,
        success_threshold: u32,
        cooldown: Duration,
    ) -> Self {
        Self {
            name,
            failure_threshold,
            success_threshold,
            cooldown,
            inner: Mutex::new(BreakerInner {
                phase: BreakerPhase::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            }),
        }
    }

    pub fn phase(&self) -> BreakerPhase {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).phase
    }

    /// Run `op` under the breaker: fails fast while open, records the
    /// outcome otherwise.
    pub async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.admit()?;
        match op.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    fn admit(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.phase != BreakerPhase::Open {
            return Ok(());
        }
        let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
        if elapsed >= self.cooldown {
            info!("CircuitBreaker [{}]: cooldown elapsed, probing (half-open)", self.name);
            inner.phase = BreakerPhase::HalfOpen;
            inner.half_open_successes = 0;
            return Ok(());
        }
        anyhow::bail!(
            "circuit breaker [{}] open, retry in {:?}",
            self.name,
            self.cooldown - elapsed
        )
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.phase {
            BreakerPhase::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerPhase::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.success_threshold {
                    info!("CircuitBreaker [{}]: recovered, closing", self.name);
                    inner.phase = BreakerPhase::Closed;
                    inner.consecutive_failures = 0;
                }
            }
            BreakerPhase::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.consecutive_failures += 1;
        match inner.phase {
            BreakerPhase::Closed => {
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        "CircuitBreaker [{}]: {} consecutive failures, opening",
                        self.name, inner.consecutive_failures
                    );
                    inner.phase = BreakerPhase::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerPhase::HalfOpen => {
                warn!("CircuitBreaker [{}]: probe failed, reopening", self.name);
                inner.phase = BreakerPhase::Open;
                inner.opened_at = Some(Instant::now());
            }
            BreakerPhase::Open => {}
        }
    }
}
