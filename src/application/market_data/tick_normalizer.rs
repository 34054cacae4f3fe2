//! Boundary parser for raw feed envelopes.
//!
//! The feed multiplexes per-symbol ticker streams over one connection and
//! wraps every payload in a combined-stream envelope:
//! `{"stream": "btcusdt@ticker", "data": {"s": "BTCUSDT", "c": "...", ...}}`.
//! Parsing is total: every failure maps to a typed `FeedParseError` and the
//! caller drops the single message without disturbing the stream.

use crate::domain::errors::FeedParseError;
use crate::domain::market::types::Tick;
use rust_decimal::Decimal;
use serde::Deserialize;

const TICKER_SUFFIX: &str = "@ticker";

#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    stream: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    /// Upper-case symbol; falls back to the stream name when absent.
    #[serde(rename = "s")]
    symbol: Option<String>,
    /// Last price, transmitted as a string.
    #[serde(rename = "c")]
    close: Option<String>,
    /// 24h percent change, transmitted as a string.
    #[serde(rename = "P")]
    pct_change: Option<String>,
    /// Event time in epoch milliseconds.
    #[serde(rename = "E")]
    event_time: Option<i64>,
}

/// Parse one raw envelope into a canonical `Tick`.
pub fn normalize(text: &str) -> Result<Tick, FeedParseError> {
    let envelope: StreamEnvelope =
        serde_json::from_str(text).map_err(|e| FeedParseError::Malformed {
            reason: e.to_string(),
        })?;
    let StreamEnvelope { stream, data } = envelope;

    let Some(stream_symbol) = stream.strip_suffix(TICKER_SUFFIX) else {
        return Err(FeedParseError::UnknownStream { stream });
    };
    let stream_symbol = stream_symbol.to_uppercase();

    let ticker: TickerData =
        serde_json::from_value(data).map_err(|e| FeedParseError::Malformed {
            reason: e.to_string(),
        })?;

    let symbol = ticker.symbol.unwrap_or(stream_symbol);

    let raw_close = ticker
        .close
        .ok_or(FeedParseError::MissingField { field: "c" })?;
    let price =
        Decimal::from_str_exact(&raw_close).map_err(|_| FeedParseError::Malformed {
            reason: format!("unparseable close price '{}'", raw_close),
        })?;
    if price <= Decimal::ZERO {
        return Err(FeedParseError::NonPositivePrice { symbol, price });
    }

    let pct_change = ticker
        .pct_change
        .as_deref()
        .and_then(|p| Decimal::from_str_exact(p).ok())
        .unwrap_or(Decimal::ZERO);

    let timestamp = ticker
        .event_time
        .ok_or(FeedParseError::MissingField { field: "E" })?;

    Ok(Tick {
        symbol,
        price,
        pct_change,
        timestamp,
    })
}
