//! Engine assembly: cold-start seeding through a fake REST API, signal
//! publication, and graceful shutdown.

use anyhow::Result;
use async_trait::async_trait;
use marketpulse::application::system::Engine;
use marketpulse::config::Config;
use marketpulse::domain::market::types::Candle;
use marketpulse::domain::ports::MarketApi;
use marketpulse::domain::trading::signal::Direction;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Serves a fixed rising history and static prices; no network involved.
struct FakeMarketApi;

#[async_trait]
impl MarketApi for FakeMarketApi {
    async fn get_prices(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        Ok(symbols
            .iter()
            .map(|s| (s.clone(), dec!(68000)))
            .collect())
    }

    async fn get_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        let n = limit.min(40) as i64;
        Ok((0..n)
            .map(|i| {
                let close = dec!(100) + Decimal::from(i);
                Candle {
                    symbol: symbol.to_string(),
                    open: close,
                    high: close + dec!(0.5),
                    low: close - dec!(0.5),
                    close,
                    volume: dec!(10),
                    timestamp: i * 60_000,
                }
            })
            .collect())
    }
}

fn offline_config() -> Config {
    let mut config = Config::default();
    config.symbols = vec!["BTCUSDT".to_string()];
    // Unroutable endpoint: the session task dials in the background and
    // backs off; nothing in these tests depends on it succeeding.
    config.feed.ws_url = "ws://127.0.0.1:9".to_string();
    config
}

#[tokio::test]
async fn test_cold_start_seeds_and_publishes_signal() {
    let mut engine = Engine::with_market_api(offline_config(), Arc::new(FakeMarketApi));
    let mut signals = engine.signals();

    engine.start().await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), signals.recv())
        .await
        .expect("seeding should publish a cycle")
        .unwrap();

    assert_eq!(event.signal.symbol, "BTCUSDT");
    // Strictly rising seeded history: overbought, RSI pegged at 100
    assert_eq!(event.snapshot.rsi, 100.0);
    assert_eq!(event.signal.direction, Direction::Sell);
    assert!(event.risk.take_profit < event.risk.entry_price);
    assert!(event.risk.stop_loss > event.risk.entry_price);

    engine.stop().await;
}

#[tokio::test]
async fn test_seed_failure_degrades_instead_of_aborting() {
    struct FailingApi;

    #[async_trait]
    impl MarketApi for FailingApi {
        async fn get_prices(&self, _symbols: &[String]) -> Result<HashMap<String, Decimal>> {
            anyhow::bail!("service unavailable")
        }

        async fn get_candles(&self, _symbol: &str, _limit: usize) -> Result<Vec<Candle>> {
            anyhow::bail!("service unavailable")
        }
    }

    let mut engine = Engine::with_market_api(offline_config(), Arc::new(FailingApi));
    // Startup must survive a dead REST dependency
    engine.start().await.unwrap();
    engine.stop().await;
}

#[tokio::test]
async fn test_sentiment_input_reaches_next_cycle() {
    let mut engine = Engine::with_market_api(offline_config(), Arc::new(FakeMarketApi));
    engine.set_sentiment("BTCUSDT", -0.6);

    let mut signals = engine.signals();
    engine.start().await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), signals.recv())
        .await
        .unwrap()
        .unwrap();

    // SELL signal with aligned bearish sentiment: 70 + 3 nudge
    assert_eq!(event.signal.direction, Direction::Sell);
    assert_eq!(event.signal.confidence, 73.0);
    assert!(
        event
            .signal
            .bearish_factors
            .iter()
            .any(|f| f.contains("sentiment"))
    );

    engine.stop().await;
}
