//! Per-domain refresh scheduling.
//!
//! Each REST-backed domain (fallback prices, remote signals, portfolio,
//! patterns) runs its own countdown on a shared 1-second cadence. A domain
//! whose previous fetch is still in flight skips the cycle instead of
//! stacking a second request; an atomic in-flight flag per domain enforces
//! this.

use crate::domain::market::types::ConnectionState;
use crate::domain::ports::RefreshTask;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct DomainSlot {
    name: String,
    interval_secs: u64,
    remaining_secs: u64,
    /// Price polling is the only domain suppressed while the stream is
    /// healthy; analytics domains run regardless of stream state.
    suppress_while_streaming: bool,
    in_flight: Arc<AtomicBool>,
    task: Arc<dyn RefreshTask>,
}

pub struct RefreshScheduler {
    domains: Vec<DomainSlot>,
    conn_state: watch::Receiver<ConnectionState>,
}

impl RefreshScheduler {
    pub fn new(conn_state: watch::Receiver<ConnectionState>) -> Self {
        Self {
            domains: Vec::new(),
            conn_state,
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        suppress_while_streaming: bool,
        task: Arc<dyn RefreshTask>,
    ) {
        let name = name.into();
        let interval_secs = interval.as_secs().max(1);
        info!(
            "RefreshScheduler: registered '{}' every {}s{}",
            name,
            interval_secs,
            if suppress_while_streaming {
                " (suppressed while stream connected)"
            } else {
                ""
            }
        );
        self.domains.push(DomainSlot {
            name,
            interval_secs,
            remaining_secs: interval_secs,
            suppress_while_streaming,
            in_flight: Arc::new(AtomicBool::new(false)),
            task,
        });
    }

    /// Advance every countdown by one second, starting fetches for domains
    /// that reached zero. Countdowns reset immediately whether or not a
    /// fetch starts, so a skipped cycle never shortens the next one.
    pub fn tick(&mut self) {
        let streaming = *self.conn_state.borrow() == ConnectionState::Connected;

        for slot in &mut self.domains {
            slot.remaining_secs = slot.remaining_secs.saturating_sub(1);
            if slot.remaining_secs > 0 {
                continue;
            }
            slot.remaining_secs = slot.interval_secs;

            if slot.suppress_while_streaming && streaming {
                debug!(
                    "RefreshScheduler: '{}' suppressed while stream is connected",
                    slot.name
                );
                continue;
            }

            // swap returns the previous value: true means a fetch is still
            // running and this cycle is skipped
            if slot.in_flight.swap(true, Ordering::SeqCst) {
                warn!(
                    "RefreshScheduler: '{}' fetch still in flight, skipping cycle",
                    slot.name
                );
                continue;
            }

            let task = Arc::clone(&slot.task);
            let in_flight = Arc::clone(&slot.in_flight);
            let name = slot.name.clone();
            tokio::spawn(async move {
                if let Err(e) = task.refresh().await {
                    warn!("RefreshScheduler: '{}' refresh failed: {:#}", name, e);
                }
                // Cleared on success and failure alike
                in_flight.store(false, Ordering::SeqCst);
            });
        }
    }

    /// Consume the scheduler into its 1-second cadence loop. The returned
    /// handle is aborted on shutdown, cancelling all pending countdowns.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval tick fires immediately; consume it so
            // countdowns start from their full value.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.tick();
            }
        })
    }
}
