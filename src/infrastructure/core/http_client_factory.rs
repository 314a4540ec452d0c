use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates a new HTTP client with retry middleware
    ///
    /// `transport_retries` only covers connection-level blips; the market
    /// window assembler applies its own attempt budget on top.
    pub fn create_client(transport_retries: u32, timeout: Duration) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(transport_retries);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}

/// Builds a URL with query parameters.
///
/// reqwest-middleware doesn't expose `.query()`, so the query string is
/// encoded with `url` and appended up front.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> anyhow::Result<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let url = url::Url::parse_with_params(
        base_url,
        params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())),
    )?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_with_query_encodes_values() {
        let url = build_url_with_query(
            "https://api.example.com/v5/market/kline",
            &[("symbol", "BTC USDT"), ("limit", "1000")],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://api.example.com/v5/market/kline?symbol=BTC+USDT&limit=1000"
        );
    }

    #[test]
    fn test_build_url_rejects_garbage_base() {
        let params: [(&str, &str); 0] = [];
        assert!(build_url_with_query("not a url", &params).is_err());
    }
}
