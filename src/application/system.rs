//! Engine assembly and lifecycle.
//!
//! Wires the stream manager, the signal pipeline and the refresh scheduler
//! into one component with an explicit `start()`/`stop()` lifecycle. The
//! consumer (a presentation or order-management layer) subscribes to the
//! published signal events and reads the price cache; it never touches the
//! internals.

use crate::application::market_data::price_poller::PricePoller;
use crate::application::pipeline::{SignalEvent, SignalPipeline};
use crate::application::scheduler::RefreshScheduler;
use crate::application::signals::SentimentScores;
use crate::config::Config;
use crate::domain::market::price_cache::PriceCache;
use crate::domain::market::types::{ConnectionState, MarketEvent};
use crate::domain::ports::{MarketApi, RefreshTask};
use crate::infrastructure::rest::analytics::{AnalyticsClient, CachedEndpoint};
use crate::infrastructure::rest::client::RestMarketClient;
use crate::infrastructure::stream::manager::{StreamConfig, StreamConnectionManager};
use crate::infrastructure::stream::supervisor::BackoffPolicy;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Install the process-wide tracing subscriber and load `.env`, honoring
/// `RUST_LOG`. Opt-in: the consuming binary decides whether to call it.
pub fn init_tracing() {
    let _ = dotenvy::dotenv();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub struct Engine {
    config: Config,
    market_tx: broadcast::Sender<MarketEvent>,
    signal_tx: broadcast::Sender<SignalEvent>,
    price_cache: Arc<PriceCache>,
    sentiment: SentimentScores,
    stream: Arc<StreamConnectionManager>,
    market_api: Arc<dyn MarketApi>,
    analytics: Vec<(&'static str, Arc<CachedEndpoint>)>,
    extra_refresh: Vec<(String, Duration, Arc<dyn RefreshTask>)>,
    scheduler_handle: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let market_api: Arc<dyn MarketApi> =
            Arc::new(RestMarketClient::new(config.feed.rest_url.clone()));
        Self::with_market_api(config, market_api)
    }

    /// Build with an injected REST implementation (fakes in tests).
    pub fn with_market_api(config: Config, market_api: Arc<dyn MarketApi>) -> Self {
        let (market_tx, _) = broadcast::channel(1024);
        let (signal_tx, _) = broadcast::channel(256);

        let stream_config = StreamConfig {
            ws_url: config.feed.ws_url.clone(),
            backoff: BackoffPolicy {
                base_ms: config.feed.backoff_base_ms,
                cap_ms: config.feed.backoff_cap_ms,
                max_attempts: config.feed.max_reconnect_attempts,
            },
            planned_reconnect_delay: config.feed.planned_reconnect_delay,
            session_max: config.feed.session_max,
            preemptive_margin: config.feed.preemptive_margin,
        };
        let stream = Arc::new(StreamConnectionManager::new(
            stream_config,
            market_tx.clone(),
        ));

        Self {
            config,
            market_tx,
            signal_tx,
            price_cache: Arc::new(PriceCache::new()),
            sentiment: Arc::new(RwLock::new(HashMap::new())),
            stream,
            market_api,
            analytics: Vec::new(),
            extra_refresh: Vec::new(),
            scheduler_handle: None,
            tasks: Vec::new(),
        }
    }

    /// Subscribe to published signal/risk cycles. Call before `start()` to
    /// observe the cold-start seeding cycles too.
    pub fn signals(&self) -> broadcast::Receiver<SignalEvent> {
        self.signal_tx.subscribe()
    }

    pub fn prices(&self) -> Arc<PriceCache> {
        Arc::clone(&self.price_cache)
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.stream.connection_state()
    }

    /// Supply an external sentiment score for a symbol, in [-1, 1]. Consumed
    /// by the synthesizer on the next cycle.
    pub fn set_sentiment(&self, symbol: &str, score: f64) {
        self.sentiment
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(symbol.to_string(), score.clamp(-1.0, 1.0));
    }

    /// Latest cached payload of a registered analytics domain, if any fetch
    /// has succeeded yet.
    pub fn analytics_snapshot(&self, domain: &str) -> Option<serde_json::Value> {
        self.analytics
            .iter()
            .find(|(name, _)| *name == domain)
            .and_then(|(_, endpoint)| endpoint.latest())
    }

    /// Register an additional scheduler domain before `start()`.
    pub fn register_refresh(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        task: Arc<dyn RefreshTask>,
    ) {
        self.extra_refresh.push((name.into(), interval, task));
    }

    /// Seed candle history, start the pipeline, the refresh scheduler and
    /// the streaming session.
    pub async fn start(&mut self) -> Result<()> {
        info!(
            "Engine: starting for {} symbols",
            self.config.symbols.len()
        );

        // Cold-start seeding: a failed fetch degrades to neutral indicators
        // for that symbol instead of aborting startup.
        let mut pipeline = SignalPipeline::new(
            self.market_tx.subscribe(),
            self.signal_tx.clone(),
            Arc::clone(&self.price_cache),
            Arc::clone(&self.sentiment),
            self.config.candle_lookback,
        );
        for symbol in &self.config.symbols {
            match self
                .market_api
                .get_candles(symbol, self.config.candle_lookback)
                .await
            {
                Ok(candles) => pipeline.seed_history(symbol, candles),
                Err(e) => warn!("Engine: history seed failed for {}: {:#}", symbol, e),
            }
        }
        self.tasks.push(tokio::spawn(async move {
            pipeline.run().await;
        }));

        // Refresh scheduler: price fallback plus the analytics domains
        let mut scheduler = RefreshScheduler::new(self.stream.connection_state());
        scheduler.register(
            "price-fallback",
            Duration::from_secs(self.config.refresh.price_poll_secs),
            true,
            Arc::new(PricePoller::new(
                Arc::clone(&self.market_api),
                self.config.symbols.clone(),
                Arc::clone(&self.price_cache),
                self.market_tx.clone(),
            )),
        );
        if let Some(analytics_url) = &self.config.feed.analytics_url {
            let client = AnalyticsClient::new(analytics_url.clone());
            let domains: [(&'static str, &'static str, u64); 3] = [
                ("signals", "/api/signals/current", self.config.refresh.signals_secs),
                ("portfolio", "/api/portfolio/summary", self.config.refresh.portfolio_secs),
                ("patterns", "/api/patterns/current", self.config.refresh.patterns_secs),
            ];
            for (name, path, secs) in domains {
                let endpoint = Arc::new(CachedEndpoint::new(client.clone(), path));
                self.analytics.push((name, Arc::clone(&endpoint)));
                scheduler.register(name, Duration::from_secs(secs), false, endpoint);
            }
        }
        for (name, interval, task) in self.extra_refresh.drain(..) {
            scheduler.register(name, interval, false, task);
        }
        self.scheduler_handle = Some(scheduler.spawn());

        self.stream.connect(self.config.symbols.clone()).await?;
        Ok(())
    }

    /// Reconnect the stream after a fallback or manual disconnect.
    pub async fn reconnect(&self) -> Result<()> {
        self.stream.connect(self.config.symbols.clone()).await
    }

    pub async fn disconnect_stream(&self) {
        self.stream.disconnect().await;
    }

    /// Graceful shutdown: closes the stream and cancels every timer and
    /// worker task.
    pub async fn stop(&mut self) {
        self.stream.disconnect().await;
        if let Some(handle) = self.scheduler_handle.take() {
            handle.abort();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("Engine: stopped");
    }
}
