use anyhow::{Context, Result};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

/// HTTP client shared by all REST access: pooled, bounded timeouts, and
/// transient failures retried with exponential backoff (max 3 retries).
pub fn retrying_client() -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    let client = Client::builder()
        .pool_max_idle_per_host(4)
        .timeout(Duration::from_secs(20))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new());

    ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

/// Append query parameters to a base URL. reqwest-middleware does not expose
/// `.query()`, so the URL is assembled up front.
pub fn url_with_query(base: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut url = url::Url::parse(base).with_context(|| format!("invalid URL '{}'", base))?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_with_query_appends_and_encodes() {
        let url = url_with_query(
            "https://api.example.com/api/v3/ticker/price",
            &[("symbols", r#"["BTCUSDT","ETHUSDT"]"#)],
        )
        .unwrap();
        assert!(url.starts_with("https://api.example.com/api/v3/ticker/price?symbols="));
        assert!(url.contains("%22BTCUSDT%22"));
    }

    #[test]
    fn test_url_with_query_rejects_garbage_base() {
        assert!(url_with_query("not a url", &[("a", "b")]).is_err());
    }
}
