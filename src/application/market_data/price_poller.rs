use crate::domain::market::price_cache::PriceCache;
use crate::domain::market::types::{MarketEvent, Tick};
use crate::domain::ports::{MarketApi, RefreshTask};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// REST fallback price source.
///
/// Driven by the refresh scheduler whenever the stream is not healthy:
/// fetches the batched last prices and feeds them into the same market event
/// channel the live stream uses, so the rest of the pipeline is oblivious to
/// the degraded transport.
pub struct PricePoller {
    api: Arc<dyn MarketApi>,
    symbols: Vec<String>,
    price_cache: Arc<PriceCache>,
    event_tx: broadcast::Sender<MarketEvent>,
}

impl PricePoller {
    pub fn new(
        api: Arc<dyn MarketApi>,
        symbols: Vec<String>,
        price_cache: Arc<PriceCache>,
        event_tx: broadcast::Sender<MarketEvent>,
    ) -> Self {
        Self {
            api,
            symbols,
            price_cache,
            event_tx,
        }
    }
}

#[async_trait]
impl RefreshTask for PricePoller {
    async fn refresh(&self) -> Result<()> {
        let prices = self.api.get_prices(&self.symbols).await?;
        let now = chrono::Utc::now().timestamp_millis();

        for (symbol, price) in prices {
            if price <= Decimal::ZERO {
                debug!("PricePoller: ignoring non-positive price for {}", symbol);
                continue;
            }

            // The batched ticker carries no change field; derive it from the
            // previous cached price when one exists.
            let pct_change = match self.price_cache.last_price(&symbol) {
                Some(prev) if prev > Decimal::ZERO => (price - prev) / prev * dec!(100),
                _ => Decimal::ZERO,
            };

            let tick = Tick {
                symbol,
                price,
                pct_change,
                timestamp: now,
            };
            // Ingestion (cache write, aggregation) happens in the pipeline,
            // same as for streamed ticks.
            let _ = self.event_tx.send(MarketEvent::Tick(tick));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedPrices(HashMap<String, Decimal>);

    #[async_trait]
    impl MarketApi for FixedPrices {
        async fn get_prices(&self, _symbols: &[String]) -> Result<HashMap<String, Decimal>> {
            Ok(self.0.clone())
        }

        async fn get_candles(
            &self,
            _symbol: &str,
            _limit: usize,
        ) -> Result<Vec<crate::domain::market::types::Candle>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_polled_prices_become_ticks() {
        let mut prices = HashMap::new();
        prices.insert("BTCUSDT".to_string(), dec!(68000));
        let api = Arc::new(FixedPrices(prices));

        let cache = Arc::new(PriceCache::new());
        let (event_tx, mut event_rx) = broadcast::channel(16);
        let poller = PricePoller::new(
            api,
            vec!["BTCUSDT".to_string()],
            Arc::clone(&cache),
            event_tx,
        );

        poller.refresh().await.unwrap();

        match event_rx.try_recv().unwrap() {
            MarketEvent::Tick(tick) => {
                assert_eq!(tick.symbol, "BTCUSDT");
                assert_eq!(tick.price, dec!(68000));
                assert_eq!(tick.pct_change, Decimal::ZERO);
            }
            other => panic!("expected tick, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_positive_prices_skipped() {
        let mut prices = HashMap::new();
        prices.insert("BADUSDT".to_string(), Decimal::ZERO);
        let api = Arc::new(FixedPrices(prices));

        let cache = Arc::new(PriceCache::new());
        let (event_tx, mut event_rx) = broadcast::channel(16);
        let poller = PricePoller::new(api, vec!["BADUSDT".to_string()], cache, event_tx);

        poller.refresh().await.unwrap();
        assert!(event_rx.try_recv().is_err());
    }
}
