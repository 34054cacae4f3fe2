use crate::application::market_data::tick_normalizer;
use crate::domain::market::types::{ConnectionState, MarketEvent};
use crate::infrastructure::stream::supervisor::{
    BackoffPolicy, ConnectionSupervisor, StreamEvent, SupervisorAction,
};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub ws_url: String,
    pub backoff: BackoffPolicy,
    pub planned_reconnect_delay: Duration,
    /// Provider-imposed maximum session duration.
    pub session_max: Duration,
    /// Close this long before `session_max` so the provider never drops us.
    pub preemptive_margin: Duration,
}

/// How one streaming session ended.
enum SessionEnd {
    /// Normal close code: self-initiated ahead of the session cap, or a
    /// graceful server close. Reconnects without consuming an attempt.
    Planned,
    Abnormal { reason: String },
}

/// Owns the multiplexed streaming session over all subscribed symbols.
///
/// Ticks fan out on a broadcast channel in per-symbol arrival order; the
/// connection lifecycle is observable through a watch channel. All policy
/// decisions are delegated to the [`ConnectionSupervisor`]; this type only
/// moves bytes and executes the supervisor's actions.
pub struct StreamConnectionManager {
    config: StreamConfig,
    event_tx: broadcast::Sender<MarketEvent>,
    state_tx: watch::Sender<ConnectionState>,
    task_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StreamConnectionManager {
    pub fn new(config: StreamConfig, event_tx: broadcast::Sender<MarketEvent>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            event_tx,
            state_tx,
            task_handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Sink for normalized ticks (and synthesized fallback ticks).
    pub fn events(&self) -> broadcast::Receiver<MarketEvent> {
        self.event_tx.subscribe()
    }

    /// Observable connection lifecycle.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Open one multiplexed session covering all `symbols`. A session that
    /// is already running is torn down first, cancelling its timers.
    pub async fn connect(&self, symbols: Vec<String>) -> Result<()> {
        anyhow::ensure!(!symbols.is_empty(), "cannot connect with an empty symbol list");

        let mut guard = self.task_handle.lock().await;
        if let Some(handle) = guard.take() {
            debug!("StreamManager: aborting previous session task");
            handle.abort();
        }

        let mut supervisor = ConnectionSupervisor::new(
            self.config.backoff.clone(),
            self.config.planned_reconnect_delay,
        );
        supervisor.on_event(StreamEvent::ConnectRequested);

        let config = self.config.clone();
        let event_tx = self.event_tx.clone();
        let state_tx = self.state_tx.clone();
        let handle = tokio::spawn(async move {
            Self::run_session(config, symbols, event_tx, state_tx, supervisor).await;
        });
        *guard = Some(handle);
        Ok(())
    }

    /// Close gracefully and cancel every pending reconnect or session timer.
    pub async fn disconnect(&self) {
        let mut guard = self.task_handle.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
        info!("StreamManager: disconnected");
    }

    async fn run_session(
        config: StreamConfig,
        symbols: Vec<String>,
        event_tx: broadcast::Sender<MarketEvent>,
        state_tx: watch::Sender<ConnectionState>,
        mut supervisor: ConnectionSupervisor,
    ) {
        loop {
            state_tx.send_replace(supervisor.state());

            let end =
                match Self::connect_and_stream(&config, &symbols, &event_tx, &state_tx, &mut supervisor)
                    .await
                {
                    Ok(end) => end,
                    Err(e) => SessionEnd::Abnormal {
                        reason: format!("{:#}", e),
                    },
                };

            let event = match end {
                SessionEnd::Planned => StreamEvent::ClosedPlanned,
                SessionEnd::Abnormal { reason } => StreamEvent::ClosedAbnormally { reason },
            };

            match supervisor.on_event(event) {
                SupervisorAction::RetryAfter(delay) => {
                    state_tx.send_replace(supervisor.state());
                    tokio::time::sleep(delay).await;
                    supervisor.on_event(StreamEvent::RetryElapsed);
                }
                SupervisorAction::EnterFallback => {
                    // The refresh scheduler's price domain takes over from
                    // here; it polls whenever the state is not CONNECTED.
                    state_tx.send_replace(ConnectionState::FailedFallback);
                    warn!(
                        "StreamManager: reconnect attempts exhausted, REST fallback is now the price source"
                    );
                    break;
                }
                SupervisorAction::Connect | SupervisorAction::None => {}
            }
        }
    }

    async fn connect_and_stream(
        config: &StreamConfig,
        symbols: &[String],
        event_tx: &broadcast::Sender<MarketEvent>,
        state_tx: &watch::Sender<ConnectionState>,
        supervisor: &mut ConnectionSupervisor,
    ) -> Result<SessionEnd> {
        // Combined-stream endpoint: one socket multiplexing every symbol
        let streams: Vec<String> = symbols
            .iter()
            .map(|s| format!("{}@ticker", s.to_lowercase()))
            .collect();
        let url = format!(
            "{}/stream?streams={}",
            config.ws_url.trim_end_matches('/'),
            streams.join("/")
        );

        info!("StreamManager: connecting to {}", url);
        let (ws_stream, _) = connect_async(&url)
            .await
            .context("failed to open market data stream")?;

        supervisor.on_event(StreamEvent::Opened);
        state_tx.send_replace(supervisor.state());
        info!(
            "StreamManager: connected, {} ticker streams multiplexed",
            streams.len()
        );

        let (mut write, mut read) = ws_stream.split();

        // Single writer task owns the sink, so heartbeat replies and the
        // planned close never contend with the read loop.
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);
        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        // Self-close ahead of the provider's session-lifetime cap
        let session_budget = config.session_max.saturating_sub(config.preemptive_margin);
        let session_deadline = tokio::time::sleep(session_budget);
        tokio::pin!(session_deadline);

        let end = loop {
            tokio::select! {
                _ = &mut session_deadline => {
                    info!("StreamManager: approaching provider session cap, closing for planned reconnect");
                    let _ = out_tx.send(Message::Close(None)).await;
                    break SessionEnd::Planned;
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        Self::handle_text(&text, event_tx, &out_tx).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        debug!("StreamManager: ping frame, answering");
                        let _ = out_tx.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(Some(frame)))) if frame.code == CloseCode::Normal => {
                        info!("StreamManager: server closed normally");
                        break SessionEnd::Planned;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break SessionEnd::Abnormal {
                            reason: frame
                                .map(|f| format!("close code {}: {}", f.code, f.reason))
                                .unwrap_or_else(|| "close without frame".to_string()),
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        break SessionEnd::Abnormal {
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        break SessionEnd::Abnormal {
                            reason: "stream ended unexpectedly".to_string(),
                        };
                    }
                }
            }
        };

        writer.abort();
        Ok(end)
    }

    /// Handle one text frame: heartbeat or data. Malformed payloads are
    /// dropped with a log line; they never tear down the connection.
    async fn handle_text(
        text: &str,
        event_tx: &broadcast::Sender<MarketEvent>,
        out_tx: &mpsc::Sender<Message>,
    ) {
        // Application-level heartbeat: opaque ping text, answered in kind
        if text.eq_ignore_ascii_case("ping") {
            debug!("StreamManager: heartbeat ping, answering pong");
            let _ = out_tx.send(Message::Text("pong".into())).await;
            return;
        }

        match tick_normalizer::normalize(text) {
            Ok(tick) => {
                let _ = event_tx.send(MarketEvent::Tick(tick));
            }
            Err(e) => {
                debug!("StreamManager: dropping unusable feed message: {}", e);
            }
        }
    }
}
