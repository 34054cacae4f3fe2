use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced while normalizing a single raw feed message.
///
/// Always recovered locally: the offending message is dropped and the stream
/// continues.
#[derive(Debug, Error)]
pub enum FeedParseError {
    #[error("malformed feed envelope: {reason}")]
    Malformed { reason: String },

    #[error("missing field '{field}' in feed payload")]
    MissingField { field: &'static str },

    #[error("unknown stream '{stream}'")]
    UnknownStream { stream: String },

    #[error("non-positive price {price} for {symbol}")]
    NonPositivePrice { symbol: String, price: Decimal },
}

/// Errors related to market data transport and REST fetching.
///
/// These drive the connection state machine and the degraded-data flags;
/// none of them is fatal to the process.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("Invalid market data for {symbol}: {reason}")]
    InvalidData { symbol: String, reason: String },

    #[error("Service timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}
