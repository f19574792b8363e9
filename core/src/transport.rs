//! Transport port and its implementations.
//!
//! # Design
//! [`Transport`] is the only place that performs I/O. It returns every
//! response it receives as data, whatever the status. Failures that prevent
//! a response from arriving, and bodies that are not UTF-8 text, become a
//! [`TransportError`].
//!
//! [`RetryingTransport`] layers a retry policy over any transport. Its own
//! budget expiry is reported as [`TransportError::PolicyTimeout`], which the
//! classifier folds into the same kind as a plain timeout.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Failures that happen before a response is received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("retry budget of {0:?} exhausted")]
    PolicyTimeout(Duration),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP {status} response body is not valid UTF-8: {reason}")]
    InvalidBody { status: u16, reason: String },

    #[error("transport error: {0}")]
    Other(String),
}

/// Sends one request and returns the response as data.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client, sharing its connection pool.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body: decode_body(status, bytes.to_vec())?,
        })
    }
}

/// Response bodies must be valid UTF-8.
fn decode_body(status: u16, bytes: Vec<u8>) -> Result<String, TransportError> {
    String::from_utf8(bytes).map_err(|e| TransportError::InvalidBody {
        status,
        reason: e.utf8_error().to_string(),
    })
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// How [`RetryingTransport`] retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Upper bound on the whole call, retries and sleeps included.
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            budget: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Retries connect failures and 502/503/504 responses.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn send_with_retries(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt = 1;
        loop {
            let outcome = self.inner.send(request.clone()).await;
            let retryable = match &outcome {
                Ok(response) => matches!(response.status, 502..=504),
                Err(TransportError::Connect(_)) => true,
                Err(_) => false,
            };
            if !retryable || attempt >= self.policy.max_attempts {
                return outcome;
            }
            let delay = self.policy.backoff(attempt);
            debug!(attempt, ?delay, url = %request.url, "retrying request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let budget = self.policy.budget;
        match tokio::time::timeout(budget, self.send_with_retries(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(?budget, "retry budget exhausted");
                Err(TransportError::PolicyTimeout(budget))
            }
        }
    }
}
