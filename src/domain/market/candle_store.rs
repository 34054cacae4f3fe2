use crate::domain::market::types::Candle;
use std::collections::{HashMap, VecDeque};
use tracing::info;

/// Bounded rolling window of completed OHLC candles per symbol.
///
/// Two fill paths: a bulk REST history seed on cold start or fallback, and
/// continuous aggregation of live ticks. Oldest candles are evicted FIFO
/// once a window exceeds the lookback.
#[derive(Debug)]
pub struct CandleStore {
    lookback: usize,
    windows: HashMap<String, VecDeque<Candle>>,
}

impl CandleStore {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback: lookback.max(1),
            windows: HashMap::new(),
        }
    }

    /// Append a completed candle, evicting the oldest entry once the window
    /// is full.
    pub fn push(&mut self, candle: Candle) {
        let window = self
            .windows
            .entry(candle.symbol.clone())
            .or_insert_with(VecDeque::new);
        window.push_back(candle);
        while window.len() > self.lookback {
            window.pop_front();
        }
    }

    /// Replace a symbol's window wholesale with fetched history, oldest
    /// first. Used on cold start and when recovering from fallback; any
    /// in-progress incremental state downstream must be rebuilt from the new
    /// window.
    pub fn seed(&mut self, symbol: &str, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.timestamp);
        if candles.len() > self.lookback {
            candles.drain(..candles.len() - self.lookback);
        }
        info!(
            "CandleStore: seeded {} with {} candles",
            symbol,
            candles.len()
        );
        self.windows.insert(symbol.to_string(), candles.into());
    }

    /// Read-only chronological view of a symbol's window.
    pub fn window(&self, symbol: &str) -> Option<&VecDeque<Candle>> {
        self.windows.get(symbol)
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.windows.get(symbol).map_or(0, |w| w.len())
    }

    pub fn is_empty(&self, symbol: &str) -> bool {
        self.len(symbol) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(symbol: &str, close: Decimal, timestamp: i64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            timestamp,
        }
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let mut store = CandleStore::new(3);
        for i in 0..5 {
            store.push(candle("BTCUSDT", dec!(100) + Decimal::from(i), i));
        }
        let window = store.window("BTCUSDT").unwrap();
        assert_eq!(window.len(), 3);
        // Oldest two evicted
        assert_eq!(window.front().unwrap().timestamp, 2);
        assert_eq!(window.back().unwrap().timestamp, 4);
    }

    #[test]
    fn test_seed_replaces_window_and_sorts() {
        let mut store = CandleStore::new(100);
        store.push(candle("ETHUSDT", dec!(1), 999));

        let history = vec![
            candle("ETHUSDT", dec!(3502), 3),
            candle("ETHUSDT", dec!(3500), 1),
            candle("ETHUSDT", dec!(3501), 2),
        ];
        store.seed("ETHUSDT", history);

        let window = store.window("ETHUSDT").unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window.front().unwrap().timestamp, 1);
        assert_eq!(window.back().unwrap().close, dec!(3502));
    }

    #[test]
    fn test_seed_truncates_to_lookback() {
        let mut store = CandleStore::new(2);
        let history = (0..10).map(|i| candle("BTCUSDT", dec!(1), i)).collect();
        store.seed("BTCUSDT", history);
        let window = store.window("BTCUSDT").unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window.front().unwrap().timestamp, 8);
    }
}
