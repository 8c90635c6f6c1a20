//! HTTP client with rate limiting for kinopro.uz
//!
//! Every client is bound to a [`SessionJar`], so cookies set by the login
//! flow are sent with later page fetches. GET requests retry transient
//! errors with exponential backoff; form posts are sent once.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};

use crate::config::ExtractorConfig;
use crate::cookies::SessionJar;
use crate::error::{KinoproError, Result};

/// Default User-Agent mimicking a modern browser
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Accept header sent with every request, same as a browser navigation
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Maximum number of retry attempts for transient errors
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Rate limiter to control request frequency
///
/// Ensures that requests are spaced at least `min_interval` apart.
pub struct RateLimiter {
    /// Minimum interval between requests
    min_interval: Duration,
    /// Timestamp of the last request
    last_request: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified requests per second
    ///
    /// # Example
    /// ```
    /// use kinopro_core::client::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(2.0); // 2 requests per second
    /// ```
    ///
    /// A rate that is not a positive finite number disables limiting.
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            Duration::try_from_secs_f64(requests_per_second.recip()).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        let now = Instant::now();
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(now.checked_sub(min_interval).unwrap_or(now))),
        }
    }

    /// Wait until the minimum interval since the previous request has passed.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();

        if elapsed < self.min_interval {
            let wait_time = self.min_interval - elapsed;
            sleep(wait_time).await;
        }

        *last = Instant::now();
    }

    /// Get the minimum interval between requests
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// HTTP client for kinopro.uz bound to one cookie jar
///
/// This client automatically:
/// - Limits request rate
/// - Retries GETs on transient errors (429, 5xx) with exponential backoff
/// - Sends the browser-like Accept and Referer headers the login form expects
pub struct KinoproClient {
    /// Underlying HTTP client
    client: reqwest::Client,
    /// Rate limiter for request throttling
    rate_limiter: RateLimiter,
    /// Cookie jar shared with the underlying client
    jar: Arc<SessionJar>,
}

impl KinoproClient {
    /// Create a client with a fresh, empty cookie jar.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        Self::with_jar(config, Arc::new(SessionJar::new()))
    }

    /// Create a client that reads and writes cookies through `jar`.
    ///
    /// # Errors
    /// - `KinoproError::InvalidConfig` - `requests_per_second` is not a positive number
    /// - `KinoproError::InvalidUrl` - base URL is not a valid Referer value
    /// - `KinoproError::HttpError` - the HTTP client cannot be created
    pub fn with_jar(config: &ExtractorConfig, jar: Arc<SessionJar>) -> Result<Self> {
        let rate = config.requests_per_second;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(KinoproError::InvalidConfig(format!(
                "requests_per_second must be a positive number, got {rate}"
            )));
        }
        let referer = HeaderValue::from_str(&config.base_url)
            .map_err(|_| KinoproError::InvalidUrl(config.base_url.clone()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(REFERER, referer);

        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(config.requests_per_second),
            jar,
        })
    }

    /// Cookie jar used by this client
    pub fn jar(&self) -> &Arc<SessionJar> {
        &self.jar
    }

    /// Fetch HTML content from an absolute URL.
    ///
    /// # Errors
    /// - `KinoproError::HttpError` - Network or HTTP error after all retries
    /// - `KinoproError::RateLimited` - Server returned 429 after all retries
    /// - `KinoproError::NotFound` - Server returned 404
    pub async fn fetch(&self, url: &str) -> Result<String> {
        self.fetch_with_retry(url, 0).await
    }

    /// Submit `form` URL-encoded to `url` with extra `query` parameters.
    ///
    /// Not retried, a login post must not be replayed blindly.
    ///
    /// # Errors
    /// - `KinoproError::HttpError` - Network error or error status
    pub async fn post_form(
        &self,
        url: &str,
        form: &BTreeMap<String, String>,
        query: &[(&str, &str)],
    ) -> Result<String> {
        self.rate_limiter.acquire().await;
        debug!(url, fields = form.len(), "posting form");

        let response = self.client.post(url).query(query).form(form).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }
        Err(status_error(response))
    }

    /// Internal method to fetch with retry logic
    fn fetch_with_retry<'a>(
        &'a self,
        url: &'a str,
        attempt: u32,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.rate_limiter.acquire().await;
            debug!(url, attempt, "fetching page");

            let response = self.client.get(url).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response.text().await?);
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(KinoproError::NotFound(url.to_string()));
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt < MAX_RETRIES {
                    let delay = self.calculate_backoff_delay(attempt);
                    warn!(url, attempt, ?delay, "rate limited, backing off");
                    sleep(delay).await;
                    return self.fetch_with_retry(url, attempt + 1).await;
                }
                return Err(KinoproError::RateLimited);
            }

            if status.is_server_error() && attempt < MAX_RETRIES {
                let delay = self.calculate_backoff_delay(attempt);
                warn!(url, attempt, status = status.as_u16(), ?delay, "server error, retrying");
                sleep(delay).await;
                return self.fetch_with_retry(url, attempt + 1).await;
            }

            Err(status_error(response))
        })
    }

    /// Calculate exponential backoff delay for retry
    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        // 1s, 2s, 4s, ...
        let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
        Duration::from_millis(delay_ms)
    }
}

fn status_error(response: reqwest::Response) -> KinoproError {
    let status = response.status().as_u16();
    match response.error_for_status() {
        Err(e) => KinoproError::HttpError(e),
        Ok(_) => KinoproError::UnexpectedStatus(status),
    }
}
