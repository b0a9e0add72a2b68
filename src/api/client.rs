//! Retrying JSON-over-HTTP client
//!
//! This module handles every upstream request, including:
//! - Building the shared HTTP client (connection reuse, compression, timeouts)
//! - Bounded retries with linear backoff
//! - Classifying failed attempts (network, status, body)
//!
//! It knows nothing about marketplace semantics; see `MarketplaceApi` for that.

use crate::api::retry::RetryPolicy;
use crate::config::HttpConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Why a single attempt failed
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("response body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// A request that still failed after all allowed attempts
#[derive(Debug, Error)]
#[error("{method} {url} failed after {attempts} attempt(s): {last_error}")]
pub struct TransportError {
    pub method: Method,
    pub url: String,
    pub attempts: u32,
    #[source]
    pub last_error: AttemptError,
}

/// Anything that can turn a request into a decoded JSON document
///
/// The crawler only talks to the network through this trait, which keeps the
/// scheduler testable without sockets.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// Issues the request and returns the decoded body
    async fn fetch(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Value, TransportError>;
}

/// HTTP client with bounded retry and linear backoff
#[derive(Debug, Clone)]
pub struct RetryingHttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingHttpClient {
    /// Creates a client from the HTTP configuration
    ///
    /// # Arguments
    ///
    /// * `config` - User agent, timeout and retry settings
    ///
    /// # Returns
    ///
    /// * `Ok(RetryingHttpClient)` - Successfully built client
    /// * `Err(reqwest::Error)` - Failed to build the underlying client
    ///
    /// # Example
    ///
    /// ```no_run
    /// use catalog_crawler::api::RetryingHttpClient;
    /// use catalog_crawler::config::HttpConfig;
    ///
    /// let client = RetryingHttpClient::new(&HttpConfig::default()).unwrap();
    /// ```
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            policy: RetryPolicy::from_config(config),
        })
    }

    /// Replaces the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the active retry policy
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Value, AttemptError> {
        let response = self
            .client
            .request(method, url)
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl JsonFetcher for RetryingHttpClient {
    async fn fetch(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Value, TransportError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            tracing::debug!(
                "{} {} (attempt {}/{})",
                method,
                url,
                attempt,
                self.policy.max_attempts
            );

            match self.attempt(method.clone(), url, headers).await {
                Ok(value) => {
                    tracing::debug!("{} {} succeeded on attempt {}", method, url, attempt);
                    return Ok(value);
                }
                Err(error) => {
                    tracing::warn!(
                        "{} {} failed on attempt {}/{}: {}",
                        method,
                        url,
                        attempt,
                        self.policy.max_attempts,
                        error
                    );

                    if !self.policy.allows_retry_after(attempt) {
                        return Err(TransportError {
                            method,
                            url: url.to_string(),
                            attempts: attempt,
                            last_error: error,
                        });
                    }
                }
            }
        }
    }
}

/// Builds the shared HTTP client
///
/// Every request carries the configured user agent and the base headers;
/// endpoint-specific headers are layered on per request.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut base_headers = HeaderMap::new();
    base_headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    base_headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
    );

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(base_headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}
