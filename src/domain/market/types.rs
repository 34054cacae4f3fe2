use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single normalized price update from the live feed.
///
/// Ephemeral: consumed immediately into the price cache and the candle
/// aggregator, never retained as a series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub symbol: String,
    /// Last traded price. Always strictly positive.
    pub price: Decimal,
    /// 24h percent change as reported by the feed.
    pub pct_change: Decimal,
    /// Event time in epoch milliseconds. Non-decreasing per symbol.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Bucket start in epoch milliseconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
    Tick(Tick),
    Candle(Candle),
}

/// Observable lifecycle of the streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted; prices arrive via REST polling until an
    /// external trigger reconnects.
    FailedFallback,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
            ConnectionState::Reconnecting => write!(f, "RECONNECTING"),
            ConnectionState::FailedFallback => write!(f, "FAILED_FALLBACK"),
        }
    }
}
