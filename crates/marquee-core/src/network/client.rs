use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::config::NetworkConfig;

/// Longest server-requested pause we are willing to honour.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Query parameters that carry credentials and must never reach the logs.
const SECRET_PARAMS: [&str; 2] = ["api_key", "apikey"];

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Failures worth another attempt: timeouts, refused connections,
    /// rate limiting and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::InvalidUrl(_) | Self::UrlParse(_) => false,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// HTTP client with a per-request timeout and bounded retries.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct HttpClient {
    config: NetworkConfig,
    inner: Client,
}

impl HttpClient {
    pub fn new(config: NetworkConfig) -> ClientResult<Self> {
        let inner = build_client(&config)?;
        Ok(Self { config, inner })
    }

    fn validate_request(url: &Url) -> ClientResult<()> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(ClientError::InvalidUrl("No host in URL".to_string()));
        }
        Ok(())
    }

    /// GET with retries; only successful (2xx) responses are returned.
    pub async fn get(&self, url: &Url) -> ClientResult<Response> {
        Self::validate_request(url)?;

        let mut attempt = 0;
        loop {
            let (err, retry_after) = match self.inner.get(url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let retry_after = retry_after(resp.headers(), resp.status());
                    let err = ClientError::Status {
                        status: resp.status().as_u16(),
                        url: redact(url),
                    };
                    (err, retry_after)
                }
                Err(e) => (ClientError::Http(e.without_url()), None),
            };

            if attempt >= self.config.max_retries || !err.is_transient() {
                return Err(err);
            }

            let delay = retry_after.unwrap_or_else(|| self.backoff(attempt));
            tracing::debug!(
                url = %redact(url),
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying request: {err}"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    pub async fn get_text(&self, url: &Url) -> ClientResult<String> {
        let resp = self.get(url).await?;
        resp.text().await.map_err(|e| ClientError::Http(e.without_url()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> ClientResult<T> {
        let resp = self.get(url).await?;
        resp.json().await.map_err(|e| ClientError::Http(e.without_url()))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.retry_backoff_ms;
        let exp = base.saturating_mul(1_u64 << attempt.min(16));
        let jitter = if base > 1 {
            rand::rng().random_range(0..base / 2)
        } else {
            0
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }
}

fn build_client(config: &NetworkConfig) -> ClientResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(u64::from(config.connect_timeout_seconds)))
        .timeout(Duration::from_secs(u64::from(config.request_timeout_seconds)))
        .user_agent(config.user_agent())
        .build()
        .map_err(ClientError::Http)
}

fn retry_after(headers: &HeaderMap, status: StatusCode) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// Render a URL for logs and errors with credential parameters masked.
pub fn redact(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if SECRET_PARAMS.contains(&k.as_ref()) {
                (k.into_owned(), "***".to_string())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
