use crate::domain::market::types::Candle;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// REST-side market data access: batched last prices and historical candles.
/// Implemented by the HTTP client in infrastructure and by fakes in tests.
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Fetch last prices for all symbols in a single batched request.
    async fn get_prices(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>>;

    /// Fetch up to `limit` historical candles for a symbol at the feed's
    /// base interval, oldest first.
    async fn get_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>>;
}

/// One unit of periodic work driven by the refresh scheduler.
///
/// Implementations must tolerate being skipped for entire cycles while a
/// previous invocation is still in flight.
#[async_trait]
pub trait RefreshTask: Send + Sync {
    async fn refresh(&self) -> Result<()>;
}
