//! Configuration module for marketpulse.
//!
//! Structured configuration loading from environment variables, organized by
//! domain: the feed connection (`FEED_*`), the refresh scheduler
//! (`REFRESH_*`), and the signal engine (`ENGINE_*`). Every knob has a
//! default so a bare environment yields a working configuration.

mod feed_config;
mod refresh_config;

pub use feed_config::FeedConfig;
pub use refresh_config::RefreshConfig;

use anyhow::Result;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Main application configuration.
///
/// Aggregates the per-domain sub-configs and the subscribed symbol universe.
#[derive(Debug, Clone)]
pub struct Config {
    /// Symbols covered by the multiplexed stream, upper-cased (`BTCUSDT`).
    pub symbols: Vec<String>,
    pub feed: FeedConfig,
    pub refresh: RefreshConfig,
    /// Rolling candle window length per symbol.
    pub candle_lookback: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let raw_symbols =
            env::var("FEED_SYMBOLS").unwrap_or_else(|_| "BTCUSDT,ETHUSDT".to_string());
        let symbols: Vec<String> = raw_symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        anyhow::ensure!(!symbols.is_empty(), "FEED_SYMBOLS resolved to an empty list");

        Ok(Self {
            symbols,
            feed: FeedConfig::from_env()?,
            refresh: RefreshConfig::from_env()?,
            candle_lookback: env_parse("ENGINE_CANDLE_LOOKBACK", 100usize)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            feed: FeedConfig::default(),
            refresh: RefreshConfig::default(),
            candle_lookback: 100,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset.
/// An unparseable value is an error, not a silent fallback.
pub(crate) fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {}='{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_complete() {
        let config = Config::default();
        assert_eq!(config.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.candle_lookback, 100);
        assert_eq!(config.feed.max_reconnect_attempts, 5);
    }

    #[test]
    fn env_parse_falls_back_on_missing() {
        let value: usize = env_parse("MARKETPULSE_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }
}
