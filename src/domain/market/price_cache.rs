use crate::domain::market::types::Tick;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Process-wide last-known-price map.
///
/// Single conceptual writer (the tick-ingestion path); many readers. O(1)
/// get/set, no allocation per tick beyond the single map write.
#[derive(Debug, Default)]
pub struct PriceCache {
    inner: RwLock<HashMap<String, Tick>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Store the latest tick for a symbol. Returns false (and leaves the
    /// cache untouched) when the tick is older than the cached one: feed
    /// timestamps are non-decreasing per symbol.
    pub fn update(&self, tick: Tick) -> bool {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = map.get(&tick.symbol)
            && tick.timestamp < prev.timestamp
        {
            debug!(
                "PriceCache: dropping out-of-order tick for {} ({} < {})",
                tick.symbol, tick.timestamp, prev.timestamp
            );
            return false;
        }
        map.insert(tick.symbol.clone(), tick);
        true
    }

    pub fn last(&self, symbol: &str) -> Option<Tick> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
            .cloned()
    }

    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
            .map(|t| t.price)
    }

    pub fn snapshot(&self) -> HashMap<String, Tick> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(symbol: &str, price: Decimal, timestamp: i64) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            price,
            pct_change: Decimal::ZERO,
            timestamp,
        }
    }

    #[test]
    fn test_last_price_reflects_latest_update() {
        let cache = PriceCache::new();
        assert!(cache.last_price("BTCUSDT").is_none());

        assert!(cache.update(tick("BTCUSDT", dec!(68000), 1)));
        assert!(cache.update(tick("BTCUSDT", dec!(68100), 2)));
        assert_eq!(cache.last_price("BTCUSDT"), Some(dec!(68100)));
    }

    #[test]
    fn test_out_of_order_tick_dropped() {
        let cache = PriceCache::new();
        assert!(cache.update(tick("ETHUSDT", dec!(3500), 10)));
        assert!(!cache.update(tick("ETHUSDT", dec!(3400), 5)));
        assert_eq!(cache.last_price("ETHUSDT"), Some(dec!(3500)));
    }

    #[test]
    fn test_symbols_are_independent() {
        let cache = PriceCache::new();
        cache.update(tick("BTCUSDT", dec!(68000), 100));
        cache.update(tick("ETHUSDT", dec!(3500), 1));
        assert_eq!(cache.snapshot().len(), 2);
    }
}
