use super::env_parse;
use anyhow::Result;

/// Polling cadences for the refresh scheduler, one per REST-backed domain.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Fallback price polling. Suppressed entirely while the stream is
    /// connected.
    pub price_poll_secs: u64,
    pub signals_secs: u64,
    pub portfolio_secs: u64,
    pub patterns_secs: u64,
}

impl RefreshConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            price_poll_secs: env_parse("REFRESH_PRICE_SECS", 10)?,
            signals_secs: env_parse("REFRESH_SIGNALS_SECS", 30)?,
            portfolio_secs: env_parse("REFRESH_PORTFOLIO_SECS", 60)?,
            patterns_secs: env_parse("REFRESH_PATTERNS_SECS", 45)?,
        })
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            price_poll_secs: 10,
            signals_secs: 30,
            portfolio_secs: 60,
            patterns_secs: 45,
        }
    }
}
