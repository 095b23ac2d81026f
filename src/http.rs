//! HTTP client module
//!
//! A reqwest wrapper shared by the ingestor sources and the search-store
//! client, providing:
//! - Semaphore-based concurrency limiting
//! - Jittered exponential retry for retryable statuses and transient errors

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Request, Response, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum concurrent requests
    pub max_concurrent_requests: usize,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum retries for failed requests (0 disables retry)
    pub max_retries: u32,
    /// Initial retry delay
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
            user_agent: format!("newsflow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Single-attempt configuration for the feed fetch path, which skips
    /// failed feeds until the next cycle instead of retrying
    pub fn single_attempt(timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            max_concurrent_requests: max_concurrent,
            request_timeout: timeout,
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// HTTP client with concurrency limiting and retries
pub struct ResilientHttpClient {
    client: Client,
    semaphore: Arc<Semaphore>,
    config: HttpClientConfig,
}

impl ResilientHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(PipelineError::HttpError)?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests));

        Ok(Self {
            client,
            semaphore,
            config,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Gets the inner reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Executes a GET request
    pub async fn get(&self, url: &str) -> Result<Response> {
        let request = self.client.get(url).build().map_err(PipelineError::HttpError)?;
        self.execute(request).await
    }

    /// Executes a GET request with query parameters
    pub async fn get_with_query<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        query: &T,
    ) -> Result<Response> {
        let request = self
            .client
            .get(url)
            .query(query)
            .build()
            .map_err(PipelineError::HttpError)?;
        self.execute(request).await
    }

    /// Executes a request with retry logic (exponential backoff + jitter)
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| PipelineError::ValidationError("semaphore closed".to_string()))?;

        let url = request.url().to_string();
        let method = request.method().clone();

        debug!(method = %method, url = %url, "Executing HTTP request");

        let mut attempt = 0u32;
        let mut delay = self.config.initial_retry_delay;
        let max_retries = self.config.max_retries;
        let mut request = Some(request);

        loop {
            attempt += 1;

            // A request without a streaming body always clones
            let current = match request.as_ref().and_then(|r| r.try_clone()) {
                Some(clone) => clone,
                None => request.take().ok_or_else(|| {
                    PipelineError::ValidationError("request consumed".to_string())
                })?,
            };

            match self.client.execute(current).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        debug!(status = %status, attempt, "Request succeeded");
                        return Ok(response);
                    } else if Self::is_retryable_status(status) && attempt <= max_retries {
                        warn!(
                            status = %status,
                            attempt,
                            max_retries,
                            "Retryable status, will retry"
                        );
                        Self::sleep_with_jitter(&mut delay, self.config.max_retry_delay).await;
                    } else {
                        let body = response.text().await.unwrap_or_default();
                        return Err(PipelineError::ApiError {
                            code: status.to_string(),
                            message: body,
                        });
                    }
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && attempt <= max_retries {
                        warn!(error = %e, attempt, "Transient error, will retry");
                        Self::sleep_with_jitter(&mut delay, self.config.max_retry_delay).await;
                    } else {
                        return Err(PipelineError::HttpError(e));
                    }
                }
            }
        }
    }

    async fn sleep_with_jitter(delay: &mut Duration, max_delay: Duration) {
        // Jitter: random factor between 0.5 and 1.5
        let jitter = 0.5 + rand::random::<f64>();
        let jittered = Duration::from_secs_f64(delay.as_secs_f64() * jitter);
        tokio::time::sleep(jittered).await;
        *delay = std::cmp::min(*delay * 2, max_delay);
    }

    /// Checks if a status code should trigger a retry
    fn is_retryable_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::BAD_GATEWAY
                | StatusCode::REQUEST_TIMEOUT
        )
    }

    /// Gets the number of available permits
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
