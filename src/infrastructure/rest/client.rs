//! REST market data access: batched last prices and historical candles.
//!
//! Used for cold-start candle seeding and as the price source whenever the
//! stream is unhealthy. All calls go through the retrying HTTP client and a
//! circuit breaker.

use crate::domain::errors::MarketDataError;
use crate::domain::market::types::Candle;
use crate::domain::ports::MarketApi;
use crate::infrastructure::core::circuit_breaker::CircuitBreaker;
use crate::infrastructure::core::http_client_factory::{retrying_client, url_with_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

pub struct RestMarketClient {
    client: ClientWithMiddleware,
    base_url: String,
    breaker: CircuitBreaker,
}

impl RestMarketClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: retrying_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            breaker: CircuitBreaker::new("market-rest", 5, 2, Duration::from_secs(60)),
        }
    }
}

#[async_trait]
impl MarketApi for RestMarketClient {
    async fn get_prices(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        self.breaker
            .run(async {
                // One batched request: symbols=["BTCUSDT","ETHUSDT"]
                let symbols_json = serde_json::to_string(symbols)?;
                let url = url_with_query(
                    &format!("{}/api/v3/ticker/price", self.base_url),
                    &[("symbols", symbols_json.as_str())],
                )?;

                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .context("failed to fetch prices")?;
                let response = ensure_success(response, "price fetch").await?;

                #[derive(Debug, Deserialize)]
                struct PriceTicker {
                    symbol: String,
                    price: String,
                }

                let tickers: Vec<PriceTicker> = response
                    .json()
                    .await
                    .context("failed to parse price response")?;

                let mut prices = HashMap::new();
                for t in tickers {
                    if let Ok(price) = Decimal::from_str_exact(&t.price) {
                        prices.insert(t.symbol, price);
                    }
                }
                Ok(prices)
            })
            .await
    }

    async fn get_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        self.breaker
            .run(async {
                let limit_str = limit.to_string();
                let url = url_with_query(
                    &format!("{}/api/v3/klines", self.base_url),
                    &[
                        ("symbol", symbol),
                        ("interval", "1m"),
                        ("limit", limit_str.as_str()),
                    ],
                )?;

                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .context("failed to fetch candle history")?;
                let response = ensure_success(response, "candle history fetch").await?;

                // Kline rows: [openTime, open, high, low, close, volume, ...]
                let rows: Vec<serde_json::Value> = response
                    .json()
                    .await
                    .context("failed to parse candle history")?;

                let candles: Vec<Candle> = rows
                    .into_iter()
                    .filter_map(|row| parse_kline_row(symbol, &row))
                    .collect();

                info!(
                    "RestMarketClient: fetched {} candles for {}",
                    candles.len(),
                    symbol
                );
                Ok(candles)
            })
            .await
    }
}

/// Map HTTP-level failures to the domain taxonomy: 429 becomes a typed
/// rate-limit error, everything else non-2xx fails with the body text.
async fn ensure_success(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response> {
    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        return Err(MarketDataError::RateLimited { retry_after_secs }.into());
    }
    if !response.status().is_success() {
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("{} failed: {}", what, error_text);
    }
    Ok(response)
}

fn parse_kline_row(symbol: &str, row: &serde_json::Value) -> Option<Candle> {
    let arr = row.as_array()?;
    if arr.len() < 6 {
        return None;
    }

    let timestamp = arr[0].as_i64()?;
    let field = |i: usize| -> Option<Decimal> {
        Decimal::from_str_exact(arr[i].as_str()?).ok()
    };

    Some(Candle {
        symbol: symbol.to_string(),
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kline_row_parses() {
        let row = serde_json::json!([
            1700000000000i64,
            "68000.00",
            "68150.50",
            "67900.10",
            "68100.00",
            "123.456",
            1700000059999i64
        ]);
        let candle = parse_kline_row("BTCUSDT", &row).unwrap();
        assert_eq!(candle.symbol, "BTCUSDT");
        assert_eq!(candle.open, dec!(68000.00));
        assert_eq!(candle.high, dec!(68150.50));
        assert_eq!(candle.low, dec!(67900.10));
        assert_eq!(candle.close, dec!(68100.00));
        assert_eq!(candle.volume, dec!(123.456));
        assert_eq!(candle.timestamp, 1700000000000);
    }

    #[test]
    fn test_short_or_malformed_rows_skipped() {
        assert!(parse_kline_row("BTCUSDT", &serde_json::json!([1, "2"])).is_none());
        assert!(parse_kline_row("BTCUSDT", &serde_json::json!("nope")).is_none());
        // Non-numeric price strings
        let row = serde_json::json!([1i64, "x", "y", "z", "w", "v"]);
        assert!(parse_kline_row("BTCUSDT", &row).is_none());
    }
}
