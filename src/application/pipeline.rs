//! The per-event computation loop.
//!
//! Consumes normalized market events, maintains the price cache and candle
//! windows, and on every completed candle recomputes indicators, synthesizes
//! a fresh signal and derives its risk profile. Events are processed
//! sequentially, so per-symbol arrival order is preserved; no ordering holds
//! across symbols.

use crate::application::market_data::candle_aggregator::CandleAggregator;
use crate::application::market_data::indicator_engine::IndicatorEngine;
use crate::application::signals::risk_calculator::RiskCalculator;
use crate::application::signals::synthesizer::SignalSynthesizer;
use crate::application::signals::SentimentScores;
use crate::domain::market::candle_store::CandleStore;
use crate::domain::market::price_cache::PriceCache;
use crate::domain::market::types::{Candle, MarketEvent, Tick};
use crate::domain::trading::risk::RiskProfile;
use crate::domain::trading::signal::{IndicatorSnapshot, Signal};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// One published computation cycle: the fresh signal, its risk profile and
/// the indicator snapshot it was derived from.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    pub signal: Signal,
    pub risk: RiskProfile,
    pub snapshot: IndicatorSnapshot,
}

pub struct SignalPipeline {
    market_rx: broadcast::Receiver<MarketEvent>,
    signal_tx: broadcast::Sender<SignalEvent>,
    price_cache: Arc<PriceCache>,
    sentiment: SentimentScores,
    candle_store: CandleStore,
    aggregator: CandleAggregator,
    indicators: IndicatorEngine,
    synthesizer: SignalSynthesizer,
    risk: RiskCalculator,
}

impl SignalPipeline {
    pub fn new(
        market_rx: broadcast::Receiver<MarketEvent>,
        signal_tx: broadcast::Sender<SignalEvent>,
        price_cache: Arc<PriceCache>,
        sentiment: SentimentScores,
        candle_lookback: usize,
    ) -> Self {
        Self {
            market_rx,
            signal_tx,
            price_cache,
            sentiment,
            candle_store: CandleStore::new(candle_lookback),
            aggregator: CandleAggregator::new(),
            indicators: IndicatorEngine::default(),
            synthesizer: SignalSynthesizer::new(),
            risk: RiskCalculator::new(),
        }
    }

    /// Replace a symbol's candle window with fetched history and run one
    /// computation cycle over the fresh window.
    pub fn seed_history(&mut self, symbol: &str, candles: Vec<Candle>) {
        if candles.is_empty() {
            debug!("SignalPipeline: empty history for {}, nothing to seed", symbol);
            return;
        }
        self.candle_store.seed(symbol, candles);
        self.evaluate(symbol);
    }

    pub async fn run(&mut self) {
        info!("SignalPipeline: started");
        loop {
            match self.market_rx.recv().await {
                Ok(MarketEvent::Tick(tick)) => self.on_tick(tick),
                Ok(MarketEvent::Candle(candle)) => self.on_candle(candle),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("SignalPipeline: lagged behind market events, missed {}", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("SignalPipeline: market event channel closed, stopping");
                    break;
                }
            }
        }
    }

    fn on_tick(&mut self, tick: Tick) {
        // The cache enforces per-symbol timestamp monotonicity; a stale tick
        // is dropped before it can reach the aggregator.
        if !self.price_cache.update(tick.clone()) {
            return;
        }
        if let Some(completed) = self.aggregator.on_tick(&tick) {
            self.on_candle(completed);
        }
    }

    fn on_candle(&mut self, candle: Candle) {
        let symbol = candle.symbol.clone();
        self.candle_store.push(candle);
        self.evaluate(&symbol);
    }

    fn evaluate(&mut self, symbol: &str) {
        let Some(window) = self.candle_store.window(symbol) else {
            return;
        };

        let snapshot = self.indicators.compute(window);

        // Entry price: freshest tick when available, else the latest close
        let entry_price = self
            .price_cache
            .last_price(symbol)
            .or_else(|| window.back().map(|c| c.close))
            .unwrap_or(Decimal::ZERO);

        let sentiment = self
            .sentiment
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
            .copied();

        let generated_at = chrono::Utc::now().timestamp_millis();
        let signal = self
            .synthesizer
            .synthesize(symbol, &snapshot, sentiment, generated_at);
        let risk = self
            .risk
            .calculate(signal.direction, signal.confidence, entry_price);

        let _ = self.signal_tx.send(SignalEvent {
            signal,
            risk,
            snapshot,
        });
    }
}
