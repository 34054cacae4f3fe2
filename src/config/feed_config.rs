use super::env_parse;
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Connection settings for the multiplexed streaming feed and its REST
/// fallback.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket base URL, e.g. `wss://stream.binance.com:9443`.
    pub ws_url: String,
    /// REST base URL used for candle seeding and fallback price polling.
    pub rest_url: String,
    /// Optional base URL of the external analytics service. Its payloads
    /// are fallback/display data, never an input to the computed signal
    /// path.
    pub analytics_url: Option<String>,
    /// Reconnect attempts before giving up and entering REST fallback.
    pub max_reconnect_attempts: u32,
    /// Base of the exponential reconnect backoff.
    pub backoff_base_ms: u64,
    /// Ceiling of the reconnect backoff.
    pub backoff_cap_ms: u64,
    /// Delay before re-dialing after a planned (self-initiated) close.
    pub planned_reconnect_delay: Duration,
    /// Provider-imposed maximum session duration.
    pub session_max: Duration,
    /// How long before the session cap the client closes pre-emptively.
    pub preemptive_margin: Duration,
}

impl FeedConfig {
    pub fn from_env() -> Result<Self> {
        let ws_url = env::var("FEED_WS_URL")
            .unwrap_or_else(|_| "wss://stream.binance.com:9443".to_string());
        let rest_url =
            env::var("FEED_REST_URL").unwrap_or_else(|_| "https://api.binance.com".to_string());

        url::Url::parse(&ws_url).context("FEED_WS_URL is not a valid URL")?;
        url::Url::parse(&rest_url).context("FEED_REST_URL is not a valid URL")?;

        let analytics_url = env::var("FEED_ANALYTICS_URL").ok();
        if let Some(u) = &analytics_url {
            url::Url::parse(u).context("FEED_ANALYTICS_URL is not a valid URL")?;
        }

        let session_max_hours: u64 = env_parse("FEED_SESSION_MAX_HOURS", 24)?;
        let preemptive_margin_mins: u64 = env_parse("FEED_PREEMPTIVE_MARGIN_MINS", 30)?;

        Ok(Self {
            ws_url,
            rest_url,
            analytics_url,
            max_reconnect_attempts: env_parse("FEED_MAX_RECONNECT_ATTEMPTS", 5)?,
            backoff_base_ms: env_parse("FEED_BACKOFF_BASE_MS", 1000)?,
            backoff_cap_ms: env_parse("FEED_BACKOFF_CAP_MS", 30_000)?,
            planned_reconnect_delay: Duration::from_millis(env_parse(
                "FEED_PLANNED_RECONNECT_DELAY_MS",
                500,
            )?),
            session_max: Duration::from_secs(session_max_hours * 3600),
            preemptive_margin: Duration::from_secs(preemptive_margin_mins * 60),
        })
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://stream.binance.com:9443".to_string(),
            rest_url: "https://api.binance.com".to_string(),
            analytics_url: None,
            max_reconnect_attempts: 5,
            backoff_base_ms: 1000,
            backoff_cap_ms: 30_000,
            planned_reconnect_delay: Duration::from_millis(500),
            session_max: Duration::from_secs(24 * 3600),
            preemptive_margin: Duration::from_secs(30 * 60),
        }
    }
}
