//! GraphQL client with retry and request pacing
//!
//! Every API call goes through [`GraphQlClient::execute`], which handles:
//! - bearer-token auth headers and caller identification
//! - bounded retries with exponential backoff for transient failures
//! - `Retry-After` on 429 responses
//! - token-bucket pacing so full-replication runs do not hammer the API
//! - classification into transient vs fatal errors (fatal is never retried)

use crate::error::{is_retryable_status, Error, Result};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the GraphQL client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint URL for all queries
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Total attempts per query (first try + retries)
    pub max_attempts: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Requests per second for the pacer
    pub requests_per_second: u32,
    /// User agent string sent with every request
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            requests_per_second: 10,
            user_agent: None,
        }
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// GraphQL client bound to one endpoint and credential
pub struct GraphQlClient {
    client: reqwest::Client,
    config: ClientConfig,
    token: String,
    pacer: Arc<DirectLimiter>,
}

impl GraphQlClient {
    /// Create a new client for the given credential
    pub fn new(token: impl Into<String>, config: ClientConfig) -> Result<Self> {
        url::Url::parse(&config.base_url)?;

        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if let Some(ua) = &config.user_agent {
            builder = builder.user_agent(ua.clone());
        } else {
            builder = builder.user_agent(format!("tap-pipefy/{}", env!("CARGO_PKG_VERSION")));
        }
        let client = builder.build()?;

        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let pacer = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client,
            config,
            token: token.into(),
            pacer,
        })
    }

    /// Execute a GraphQL query and return its `data` object.
    ///
    /// Transient failures (timeouts, connection errors, 5xx, 429) are
    /// retried with exponential backoff up to `max_attempts`. Client
    /// errors and GraphQL-level rejections surface immediately as fatal.
    pub async fn execute(&self, query: &str) -> Result<Value> {
        let body = serde_json::json!({ "query": query });
        let mut last_message = String::new();

        for attempt in 0..self.config.max_attempts {
            self.pacer.until_ready().await;

            let result = self
                .client
                .post(&self.config.base_url)
                .header(AUTHORIZATION, format!("Bearer {}", self.token))
                .header(ACCEPT, "application/json")
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = extract_retry_after(&response);
                        last_message = format!("rate limited, retry after {retry_after}s");
                        if attempt + 1 < self.config.max_attempts {
                            warn!(
                                "Rate limited (429), attempt {}/{}, waiting {}s",
                                attempt + 1,
                                self.config.max_attempts,
                                retry_after
                            );
                            tokio::time::sleep(Duration::from_secs(retry_after)).await;
                            continue;
                        }
                        break;
                    }

                    if is_retryable_status(status.as_u16()) {
                        last_message = format!("HTTP {}", status.as_u16());
                        if attempt + 1 < self.config.max_attempts {
                            let delay = self.backoff_delay(attempt);
                            warn!(
                                "Request failed with {}, attempt {}/{}, retrying in {:?}",
                                status.as_u16(),
                                attempt + 1,
                                self.config.max_attempts,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        break;
                    }

                    // 4xx authorization/validation failures are fatal, not retried
                    if status.is_client_error() {
                        let text = response.text().await.unwrap_or_default();
                        return Err(Error::fatal_fetch(status.as_u16(), text));
                    }

                    let payload: Value = response.json().await?;

                    if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
                        if !errors.is_empty() {
                            return Err(Error::graphql(render_graphql_errors(errors)));
                        }
                    }

                    debug!("Query succeeded against {}", self.config.base_url);
                    return Ok(payload.get("data").cloned().unwrap_or(Value::Null));
                }
                Err(e) => {
                    let err = Error::Http(e);
                    if !err.is_transient() {
                        return Err(err);
                    }
                    last_message = err.to_string();
                    if attempt + 1 < self.config.max_attempts {
                        let delay = self.backoff_delay(attempt);
                        warn!(
                            "Network error, attempt {}/{}, retrying in {:?}: {err}",
                            attempt + 1,
                            self.config.max_attempts,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    break;
                }
            }
        }

        Err(Error::transient(self.config.max_attempts, last_message))
    }

    /// Calculate backoff delay for a given attempt (0-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(
            self.config.initial_backoff.saturating_mul(factor),
            self.config.max_backoff,
        )
    }

    /// The configured endpoint
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

impl std::fmt::Debug for GraphQlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQlClient")
            .field("base_url", &self.config.base_url)
            .field("max_attempts", &self.config.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Join GraphQL error messages into one line
fn render_graphql_errors(errors: &[Value]) -> String {
    let messages: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(Value::as_str))
        .collect();
    if messages.is_empty() {
        "unknown GraphQL error".to_string()
    } else {
        messages.join("; ")
    }
}

/// Extract retry-after header value, defaulting to 60s
fn extract_retry_after(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
